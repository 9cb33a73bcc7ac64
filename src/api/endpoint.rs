use serde_json::{json, Value};

use super::error::{fail, fail_debug};
use super::router::dispatch;
use super::types::{AppState, Request};

/// Maps one HTTP exchange onto the envelope contract. OPTIONS is answered
/// statically for CORS preflight, any method other than POST is rejected,
/// and an undecodable body surfaces as a debug envelope. Every outcome is
/// the body of an HTTP 200; the transport never signals failure.
pub fn respond(state: &AppState, method: &str, body: &str) -> Value {
    if method == "OPTIONS" {
        return json!({ "success": true, "message": "OK" });
    }
    if method != "POST" {
        return fail("Invalid request method. Only POST requests are allowed.");
    }

    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return fail_debug("Operation failed", e.to_string(), "request_body"),
    };
    let Some(req) = Request::from_body(&parsed) else {
        return fail("Missing or invalid action");
    };

    dispatch(state, req)
}
