use serde_json::{json, Value};
use thiserror::Error;

/// Handler failure taxonomy. The first four are business outcomes whose
/// message text reaches the caller verbatim; `Store` and `Internal` are
/// unexpected and surface as a generic message plus `debug_info`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Last-resort mapping to the response envelope. Nothing propagates past
    /// the dispatcher as a transport failure.
    pub fn into_envelope(self, action: &str) -> Value {
        match self {
            ApiError::Validation(msg)
            | ApiError::NotFound(msg)
            | ApiError::Auth(msg)
            | ApiError::Conflict(msg) => fail(msg),
            ApiError::Store(e) => {
                tracing::error!(action, error = %e, "store failure");
                fail_debug("Operation failed", e.to_string(), action)
            }
            ApiError::Internal(e) => {
                tracing::error!(action, error = %e, "internal failure");
                fail_debug("Operation failed", e.to_string(), action)
            }
        }
    }
}

pub fn ok(message: &str) -> Value {
    json!({ "success": true, "message": message })
}

pub fn ok_data(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

pub fn ok_with(message: &str, data: Value) -> Value {
    json!({ "success": true, "message": message, "data": data })
}

pub fn fail(message: impl Into<String>) -> Value {
    json!({ "success": false, "message": message.into() })
}

pub fn fail_debug(message: &str, error: String, location: &str) -> Value {
    json!({
        "success": false,
        "message": message,
        "debug_info": { "error": error, "location": location }
    })
}
