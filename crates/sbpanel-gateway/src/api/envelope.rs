//! Uniform response envelope of name-dispatched actions

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Failed,
}

/// `{status, message?, data?}`
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub status: EnvelopeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip)]
    http_status: StatusCode,
}

impl Envelope {
    pub fn success(data: Option<Value>) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            message: None,
            data,
            http_status: StatusCode::OK,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Failed,
            message: Some(message.into()),
            data: None,
            http_status: StatusCode::OK,
        }
    }

    pub fn unknown_action(name: &str) -> Self {
        Self::failed(format!("unknown action: {}", name))
    }

    /// Auth gate rejection, the only envelope sent with a non-200 status
    pub fn unauthorized() -> Self {
        Self {
            http_status: StatusCode::UNAUTHORIZED,
            ..Self::failed("Invalid login")
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.http_status = status;
        self
    }

    pub fn http_status(&self) -> StatusCode {
        self.http_status
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (self.http_status, Json(self)).into_response()
    }
}
