use catalog_contracts::{EntityKind, ValidationError};

use crate::graphql::BackendError;

/// Failure taxonomy shared by both gateways and the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{kind} with ID {id} not found")]
    NotFound { kind: EntityKind, id: String },
    #[error("backend failure: {0}")]
    Backend(#[from] BackendError),
}

impl GatewayError {
    pub fn not_found(kind: EntityKind, id: &str) -> Self {
        GatewayError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "invalid",
            GatewayError::NotFound { .. } => "not_found",
            GatewayError::Backend(_) => "backend_failure",
        }
    }
}
