//! Fixed client-mutation routes
//!
//! Unlike the action tables these report through transport status codes:
//! 400 for a body that does not bind, 500 when the registry refuses or fails,
//! 200 with a message on success.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use sbpanel_core::{ChangeRecord, Client, RegistryError, User};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::server::ServiceContainer;

#[derive(Debug, Deserialize)]
pub struct ClientSettings {
    pub clients: Vec<Client>,
}

/// Body of `addClient` and `updateClient`
#[derive(Debug, Deserialize)]
pub struct ClientMutationRequest {
    /// Inbound ID
    pub id: i64,
    pub settings: ClientSettings,
}

impl ClientMutationRequest {
    /// The single client the request carries
    fn into_client(self) -> Result<(i64, Client), Response> {
        let ClientMutationRequest { id, settings } = self;
        let count = settings.clients.len();
        let mut clients = settings.clients.into_iter();
        match (clients.next(), count) {
            (Some(client), 1) => Ok((id, client)),
            _ => Err(bad_request(format!(
                "exactly one client expected, got {}",
                count
            ))),
        }
    }
}

/// Body of `delClient`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteClientRequest {
    /// Inbound ID
    pub id: i64,
    pub client_id: String,
}

fn bad_request(detail: impl std::fmt::Display) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid request", "detail": detail.to_string() })),
    )
        .into_response()
}

fn operation_failed(error: &str, err: RegistryError) -> Response {
    if let RegistryError::Validation(detail) = err {
        return bad_request(detail);
    }
    warn!("[Api] {}: {}", error, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": error, "detail": err.to_string() })),
    )
        .into_response()
}

fn success(message: &str) -> Response {
    (StatusCode::OK, Json(json!({ "message": message }))).into_response()
}

async fn record(
    services: &ServiceContainer,
    caller: Option<Extension<User>>,
    action: &str,
    obj: Value,
) {
    let actor = caller
        .map(|Extension(user)| user.username)
        .unwrap_or_else(|| "api".to_string());
    let change = ChangeRecord::new(actor, "clients", action, obj);
    if let Err(e) = services.dependencies.change_repo.record(&change).await {
        warn!("[Api] Failed to record client change: {}", e);
    }
}

/// `POST {base}/addClient`
pub async fn add_client(
    State(services): State<Arc<ServiceContainer>>,
    caller: Option<Extension<User>>,
    payload: Result<Json<ClientMutationRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let (inbound_id, client) = match request.into_client() {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    let client_id = client.id.clone();
    if let Err(e) = services.registry.add_client(inbound_id, client).await {
        return operation_failed("Failed to add client", e);
    }

    info!("[Api] Client '{}' added to inbound {}", client_id, inbound_id);
    record(
        &services,
        caller,
        "new",
        json!({ "inbound": inbound_id, "id": client_id }),
    )
    .await;
    success("Client added successfully")
}

/// `POST {base}/updateClient`
pub async fn update_client(
    State(services): State<Arc<ServiceContainer>>,
    caller: Option<Extension<User>>,
    payload: Result<Json<ClientMutationRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let (inbound_id, client) = match request.into_client() {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    let updated = match services.registry.update_client(inbound_id, client).await {
        Ok(updated) => updated,
        Err(e) => return operation_failed("Failed to update client", e),
    };

    info!(
        "[Api] Client '{}' updated in inbound {}",
        updated.id, inbound_id
    );
    record(
        &services,
        caller,
        "edit",
        json!({ "inbound": inbound_id, "id": updated.id }),
    )
    .await;
    success("Client updated successfully")
}

/// `POST {base}/delClient`
pub async fn delete_client(
    State(services): State<Arc<ServiceContainer>>,
    caller: Option<Extension<User>>,
    payload: Result<Json<DeleteClientRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    if request.client_id.trim().is_empty() {
        return bad_request("clientId must not be empty");
    }

    let removed = match services
        .registry
        .delete_client(request.id, &request.client_id)
        .await
    {
        Ok(removed) => removed,
        Err(e) => return operation_failed("Failed to delete client", e),
    };

    info!(
        "[Api] Client '{}' deleted from inbound {}",
        removed.id, request.id
    );
    record(
        &services,
        caller,
        "del",
        json!({ "inbound": request.id, "id": removed.id }),
    )
    .await;
    success("Client deleted successfully")
}
