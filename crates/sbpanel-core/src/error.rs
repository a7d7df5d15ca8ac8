//! Client registry errors

use thiserror::Error;

/// Failure of a registry operation
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("inbound {0} not found")]
    InboundNotFound(i64),

    #[error("client '{client_id}' not found in inbound {inbound_id}")]
    ClientNotFound { inbound_id: i64, client_id: String },

    #[error("client '{client_id}' already exists in inbound {inbound_id}")]
    ClientConflict { inbound_id: i64, client_id: String },

    #[error("inbound tag '{0}' already in use")]
    TagConflict(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("failed to persist inbound {inbound_id}: {source}")]
    Persistence {
        inbound_id: i64,
        #[source]
        source: anyhow::Error,
    },
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::InboundNotFound(_) | RegistryError::ClientNotFound { .. }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            RegistryError::ClientConflict { .. } | RegistryError::TagConflict(_)
        )
    }
}
