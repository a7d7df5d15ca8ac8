//! Process configuration from `SBPANEL_*` environment variables

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use sbpanel_gateway::GatewayConfig;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 2095;
const DEFAULT_BASE_PATH: &str = "/api";
const DEFAULT_SESSION_TTL_MINUTES: u64 = 1440;
const DEFAULT_CORE_BIN: &str = "sing-box";

#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub host: String,
    pub port: u16,
    pub base_path: String,
    pub data_dir: PathBuf,
    pub session_ttl: Duration,
    pub core_bin: PathBuf,
    pub core_config: PathBuf,
    pub admin_password: String,
    pub enable_cors: bool,
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("{} must be a boolean, got '{}'", name, other),
    }
}

impl PanelConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let port = match var("SBPANEL_PORT") {
            Some(p) => p
                .trim()
                .parse()
                .with_context(|| format!("SBPANEL_PORT must be a port number, got '{}'", p))?,
            None => DEFAULT_PORT,
        };

        let ttl_minutes: u64 = match var("SBPANEL_SESSION_TTL_MINUTES") {
            Some(m) => m.trim().parse().with_context(|| {
                format!("SBPANEL_SESSION_TTL_MINUTES must be a number, got '{}'", m)
            })?,
            None => DEFAULT_SESSION_TTL_MINUTES,
        };
        if ttl_minutes == 0 {
            bail!("SBPANEL_SESSION_TTL_MINUTES must be positive");
        }

        let data_dir = var("SBPANEL_DATA_DIR")
            .map(PathBuf::from)
            .or_else(sbpanel_storage::default_data_dir)
            .unwrap_or_else(|| PathBuf::from("data"));

        let core_config = var("SBPANEL_CORE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("core").join("config.json"));

        let enable_cors = match var("SBPANEL_CORS") {
            Some(v) => parse_bool("SBPANEL_CORS", &v)?,
            None => false,
        };

        Ok(Self {
            host: var("SBPANEL_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            base_path: var("SBPANEL_BASE_PATH").unwrap_or_else(|| DEFAULT_BASE_PATH.to_string()),
            data_dir,
            session_ttl: Duration::from_secs(ttl_minutes * 60),
            core_bin: var("SBPANEL_CORE_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CORE_BIN)),
            core_config,
            admin_password: get("SBPANEL_ADMIN_PASSWORD")
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| sbpanel_gateway::server::DEFAULT_ADMIN_PASSWORD.to_string()),
            enable_cors,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(sbpanel_storage::DATABASE_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            host: self.host.clone(),
            port: self.port,
            base_path: self.base_path.clone(),
            enable_cors: self.enable_cors,
            session_ttl: self.session_ttl,
            ..GatewayConfig::default()
        }
    }
}
