//! Action tables
//!
//! The last path segment under the API base path names the action; the HTTP
//! verb picks the table. Parsing fails for names outside the table, which the
//! router answers with an `unknown action` envelope.

use std::fmt;
use std::str::FromStr;

/// Mutating table (POST)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Login,
    ChangePass,
    Save,
    RestartApp,
    RestartSb,
    LinkConvert,
    ImportDb,
    AddToken,
    DeleteToken,
}

impl PostAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostAction::Login => "login",
            PostAction::ChangePass => "changePass",
            PostAction::Save => "save",
            PostAction::RestartApp => "restartApp",
            PostAction::RestartSb => "restartSb",
            PostAction::LinkConvert => "linkConvert",
            PostAction::ImportDb => "importdb",
            PostAction::AddToken => "addToken",
            PostAction::DeleteToken => "deleteToken",
        }
    }

    /// Actions whose success invalidates the token cache
    pub fn rebuilds_tokens(&self) -> bool {
        matches!(self, PostAction::AddToken | PostAction::DeleteToken)
    }
}

impl FromStr for PostAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "login" => PostAction::Login,
            "changePass" => PostAction::ChangePass,
            "save" => PostAction::Save,
            "restartApp" => PostAction::RestartApp,
            "restartSb" => PostAction::RestartSb,
            "linkConvert" => PostAction::LinkConvert,
            "importdb" => PostAction::ImportDb,
            "addToken" => PostAction::AddToken,
            "deleteToken" => PostAction::DeleteToken,
            _ => return Err(()),
        })
    }
}

/// Sections served through the shared partial-load operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Inbounds,
    Outbounds,
    Endpoints,
    Tls,
    Clients,
    Config,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::Inbounds,
        Section::Outbounds,
        Section::Endpoints,
        Section::Tls,
        Section::Clients,
        Section::Config,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Inbounds => "inbounds",
            Section::Outbounds => "outbounds",
            Section::Endpoints => "endpoints",
            Section::Tls => "tls",
            Section::Clients => "clients",
            Section::Config => "config",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or(())
    }
}

/// Retrieving table (GET)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetAction {
    Logout,
    Load,
    Partial(Section),
    Users,
    Settings,
    Stats,
    Status,
    Onlines,
    Logs,
    Changes,
    Keypairs,
    GetDb,
    Tokens,
}

impl FromStr for GetAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(section) = Section::from_str(s) {
            return Ok(GetAction::Partial(section));
        }
        Ok(match s {
            "logout" => GetAction::Logout,
            "load" => GetAction::Load,
            "users" => GetAction::Users,
            "settings" => GetAction::Settings,
            "stats" => GetAction::Stats,
            "status" => GetAction::Status,
            "onlines" => GetAction::Onlines,
            "logs" => GetAction::Logs,
            "changes" => GetAction::Changes,
            "keypairs" => GetAction::Keypairs,
            "getdb" => GetAction::GetDb,
            "tokens" => GetAction::Tokens,
            _ => return Err(()),
        })
    }
}
