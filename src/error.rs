// Action error taxonomy and transport rejection mapping
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use thiserror::Error;

use crate::bus::client::BusError;

/// Terminal outcome of an action invocation, mapped to a transport rejection
/// by the bridge. Fault details are logged, never leaked to clients.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Role mismatch, or an ownership-scoped lookup that returned no row
    #[error("No access")]
    AccessDenied,

    /// A domain entity the caller may see does not exist
    #[error("{0}")]
    NotFound(String),

    /// Redemption of an unregistered or already-consumed upload token
    #[error("Invalid upload token: {0}")]
    InvalidUploadToken(String),

    /// Envelope referenced an action that was never registered
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Action parameters failed to deserialize
    #[error("Invalid parameters: {0}")]
    BadParams(String),

    /// Response payload failed to serialize
    #[error("Response encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Bus(#[from] BusError),
}

impl ActionError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ActionError::NotFound(message.into())
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        ActionError::BadParams(message.into())
    }

    /// True for lower-layer faults, as opposed to user-visible rejections
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            ActionError::Store(_) | ActionError::Bus(_) | ActionError::Encode(_)
        )
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ActionError::AccessDenied => 403,
            ActionError::NotFound(_) => 404,
            ActionError::InvalidUploadToken(_) => 409,
            ActionError::UnknownAction(_) => 404,
            ActionError::BadParams(_) => 400,
            ActionError::Encode(_) => 500,
            ActionError::Store(_) => 500,
            ActionError::Bus(_) => 502,
        }
    }

    /// Rejection code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ActionError::AccessDenied => "ACCESS_DENIED",
            ActionError::NotFound(_) => "NOT_FOUND",
            ActionError::InvalidUploadToken(_) => "UPLOAD_TOKEN_INVALID",
            ActionError::UnknownAction(_) => "UNKNOWN_ACTION",
            ActionError::BadParams(_) => "BAD_PARAMS",
            ActionError::Encode(_) => "INTERNAL_ERROR",
            ActionError::Store(_) => "STORAGE_FAULT",
            ActionError::Bus(_) => "COLLABORATOR_FAULT",
        }
    }

    /// Client-safe rejection body
    pub fn to_json(&self) -> Value {
        let message = if self.is_fault() {
            "An error occurred while processing your request".to_string()
        } else {
            self.to_string()
        };

        json!({
            "error": true,
            "message": message,
            "code": self.error_code(),
        })
    }
}

// Automatic rejection conversion for the axum bridge
impl IntoResponse for ActionError {
    fn into_response(self) -> axum::response::Response {
        if self.is_fault() {
            tracing::error!("action fault: {}", self);
        }
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
