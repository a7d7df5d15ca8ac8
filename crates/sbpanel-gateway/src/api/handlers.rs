//! Name-dispatched action handlers
//!
//! `POST {base}/{action}` and `GET {base}/{action}` resolve the name against
//! the matching table and answer with an [`Envelope`]; transport status is
//! 200 for every outcome past the auth gate.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Extension, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Uri},
    response::{IntoResponse, Response},
};
use sbpanel_core::User;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::actions::{GetAction, PostAction};
use super::envelope::Envelope;
use crate::auth::{self, SESSION_COOKIE};
use crate::server::ServiceContainer;
use crate::services::ServiceError;

type ActionResult = Result<Response, Envelope>;

fn ok(data: Option<Value>) -> ActionResult {
    Ok(Envelope::success(data).into_response())
}

fn failure(action: &str, err: ServiceError) -> Envelope {
    match &err {
        ServiceError::Internal(e) => warn!("[Api] {} failed: {:#}", action, e),
        other => debug!("[Api] {} rejected: {}", action, other),
    }
    Envelope::failed(err.to_string())
}

fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Envelope> {
    let raw: &[u8] = if body.is_empty() { b"{}" } else { body };
    serde_json::from_slice(raw).map_err(|e| Envelope::failed(format!("invalid request: {}", e)))
}

fn query<T: DeserializeOwned>(uri: &Uri) -> Result<T, Envelope> {
    Query::<T>::try_from_uri(uri)
        .map(|Query(params)| params)
        .map_err(|e| Envelope::failed(format!("invalid query: {}", e.body_text())))
}

fn require(caller: Option<Extension<User>>) -> Result<User, Envelope> {
    caller
        .map(|Extension(user)| user)
        .ok_or_else(Envelope::unauthorized)
}

/// `POST {base}/{action}`
pub async fn post_action(
    State(services): State<Arc<ServiceContainer>>,
    Path(name): Path<String>,
    caller: Option<Extension<User>>,
    body: Bytes,
) -> Response {
    let Ok(action) = name.parse::<PostAction>() else {
        debug!("[Api] Unknown POST action '{}'", name);
        return Envelope::unknown_action(&name).into_response();
    };

    match dispatch_post(&services, action, caller, body).await {
        Ok(response) => response,
        Err(envelope) => envelope.into_response(),
    }
}

async fn dispatch_post(
    services: &ServiceContainer,
    action: PostAction,
    caller: Option<Extension<User>>,
    body: Bytes,
) -> ActionResult {
    let api = &services.api;
    let name = action.as_str();

    let result = match action {
        PostAction::Login => {
            let credential = api
                .login(json_body(&body)?)
                .await
                .map_err(|e| failure(name, e))?;
            let mut response = Envelope::success(None).into_response();
            if let Some(cookie) = auth::set_session_cookie(&credential, services.sessions.ttl())
            {
                response.headers_mut().insert(header::SET_COOKIE, cookie);
            }
            return Ok(response);
        }
        PostAction::ChangePass => {
            let user = require(caller)?;
            api.change_pass(&user, json_body(&body)?)
                .await
                .map(|_| None)
        }
        PostAction::Save => {
            let user = require(caller)?;
            api.save(&user, json_body(&body)?).await.map(Some)
        }
        PostAction::RestartApp => {
            api.restart_app();
            Ok(None)
        }
        PostAction::RestartSb => api.restart_core().await.map(|_| None),
        PostAction::LinkConvert => api.link_convert(json_body(&body)?).map(Some),
        PostAction::ImportDb => api.import_db(&body).await.map(|_| None),
        PostAction::AddToken => {
            let user = require(caller)?;
            api.add_token(&user, json_body(&body)?)
                .await
                .map(|token| Some(json!(token)))
        }
        PostAction::DeleteToken => {
            let user = require(caller)?;
            api.delete_token(&user, json_body(&body)?)
                .await
                .map(|_| None)
        }
    };

    let data = result.map_err(|e| failure(name, e))?;

    if action.rebuilds_tokens() {
        // The mutation is committed; a failed rebuild keeps the old snapshot
        if let Err(e) = api.rebuild_tokens().await {
            warn!("[Api] Token cache rebuild after {} failed: {}", name, e);
            return Err(Envelope::failed(format!("token cache rebuild failed: {}", e)));
        }
    }

    ok(data)
}

/// `GET {base}/{action}`
pub async fn get_action(
    State(services): State<Arc<ServiceContainer>>,
    Path(name): Path<String>,
    caller: Option<Extension<User>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let Ok(action) = name.parse::<GetAction>() else {
        debug!("[Api] Unknown GET action '{}'", name);
        return Envelope::unknown_action(&name).into_response();
    };

    match dispatch_get(&services, action, &name, caller, &headers, &uri).await {
        Ok(response) => response,
        Err(envelope) => envelope.into_response(),
    }
}

async fn dispatch_get(
    services: &ServiceContainer,
    action: GetAction,
    name: &str,
    caller: Option<Extension<User>>,
    headers: &HeaderMap,
    uri: &Uri,
) -> ActionResult {
    let api = &services.api;

    let result = match action {
        GetAction::Logout => {
            api.logout(auth::parse_cookie(headers, SESSION_COOKIE).as_deref());
            let mut response = Envelope::success(None).into_response();
            response
                .headers_mut()
                .insert(header::SET_COOKIE, auth::clear_session_cookie());
            return Ok(response);
        }
        GetAction::Load => api.load().await,
        GetAction::Partial(section) => api.partial(section).await,
        GetAction::Users => api.users().await,
        GetAction::Settings => api.settings().await,
        GetAction::Stats => api.stats(query(uri)?).await,
        GetAction::Status => api.status().await,
        GetAction::Onlines => api.onlines().await,
        GetAction::Logs => api.logs(query(uri)?),
        GetAction::Changes => api.changes(query(uri)?).await,
        GetAction::Keypairs => api.keypairs(query(uri)?).await,
        GetAction::GetDb => {
            let bytes = api.export_db().await.map_err(|e| failure(name, e))?;
            return Ok(database_download(bytes));
        }
        GetAction::Tokens => {
            let user = require(caller)?;
            api.tokens(&user).await
        }
    };

    result.map(Some).map_err(|e| failure(name, e)).and_then(ok)
}

fn database_download(bytes: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=sbpanel.db"),
    );
    response
}
