use serde_json::Value;

use super::error::{fail, ApiError};
use super::handlers;
use super::types::{AppState, Request};

/// Dispatches a decoded request to its action handler. Every outcome,
/// success or failure, comes back as a response envelope; callers branch on
/// the `success` flag, never on transport status.
pub fn dispatch(state: &AppState, req: Request) -> Value {
    match route(state, &req) {
        Some(Ok(resp)) => resp,
        Some(Err(e)) => e.into_envelope(&req.action),
        None => fail(format!("Invalid action: {}", req.action)),
    }
}

fn route(state: &AppState, req: &Request) -> Option<Result<Value, ApiError>> {
    if let Some(resp) = handlers::auth::try_handle(state, req) {
        return Some(resp);
    }
    if let Some(resp) = handlers::password::try_handle(state, req) {
        return Some(resp);
    }
    if let Some(resp) = handlers::profile::try_handle(state, req) {
        return Some(resp);
    }
    if let Some(resp) = handlers::students::try_handle(state, req) {
        return Some(resp);
    }
    if let Some(resp) = handlers::term_results::try_handle(state, req) {
        return Some(resp);
    }
    if let Some(resp) = handlers::catalog::try_handle(state, req) {
        return Some(resp);
    }
    None
}
