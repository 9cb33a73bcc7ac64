use rusqlite::Connection;
use serde_json::Value;

use crate::email::Mailer;

/// A decoded action request. The payload keeps the whole request object so
/// handlers can pick action-specific fields out of it.
#[derive(Debug, Clone)]
pub struct Request {
    pub action: String,
    pub payload: Value,
}

impl Request {
    pub fn new(action: impl Into<String>, payload: Value) -> Self {
        Request {
            action: action.into(),
            payload,
        }
    }

    /// Builds a request from a decoded body; `None` when the body is not an
    /// object carrying a string `action`.
    pub fn from_body(body: &Value) -> Option<Self> {
        let action = body.get("action")?.as_str()?.to_string();
        Some(Request {
            action,
            payload: body.clone(),
        })
    }

    /// Field presence follows the "JSON null counts as absent" rule.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key).filter(|v| !v.is_null())
    }
}

/// Per-process dependencies, passed explicitly into every handler.
pub struct AppState {
    pub db: Connection,
    pub mailer: Box<dyn Mailer>,
    pub token_secret: String,
}

impl AppState {
    pub fn new(db: Connection, mailer: Box<dyn Mailer>, token_secret: String) -> Self {
        AppState {
            db,
            mailer,
            token_secret,
        }
    }
}
