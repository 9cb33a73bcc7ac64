use rusqlite::{params_from_iter, OptionalExtension};
use serde_json::Value;

use crate::api::error::{ok, ok_data, ApiError};
use crate::api::sanitize::{row_to_json, to_int};
use crate::api::types::{AppState, Request};
use crate::auth;

pub fn try_handle(state: &AppState, req: &Request) -> Option<Result<Value, ApiError>> {
    match req.action.as_str() {
        "get_user_profile" => Some(handle_get_profile(state, req)),
        "update_user_profile" => Some(handle_update_profile(state, req)),
        "delete_account" => Some(handle_delete_account(state, req)),
        _ => None,
    }
}

fn handle_get_profile(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    if req.get("user_id").is_none() {
        return Err(ApiError::Validation("User ID is required".into()));
    }
    let user_id = to_int(req.get("user_id"), 0);

    // Explicit projection keeps credential fields out of the response.
    let user = state
        .db
        .query_row(
            "SELECT user_id, email, first_name, last_name, role, status,
                    creation_date, last_login
             FROM users
             WHERE user_id = ? AND status = 'active'",
            [user_id],
            |r| row_to_json(r),
        )
        .optional()?;

    let Some(user) = user else {
        return Err(ApiError::NotFound("User not found".into()));
    };

    Ok(ok_data(user))
}

fn handle_update_profile(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    if req.get("user_id").is_none() {
        return Err(ApiError::Validation("User ID is required".into()));
    }
    let user_id = to_int(req.get("user_id"), 0);

    if let Some(email) = req.get("email").and_then(|v| v.as_str()) {
        let taken: Option<i64> = state
            .db
            .query_row(
                "SELECT user_id FROM users WHERE email = ? AND user_id != ?",
                (email, user_id),
                |r| r.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(ApiError::Conflict("Email already in use".into()));
        }
    }

    let mut set_clauses: Vec<&str> = Vec::new();
    let mut params: Vec<rusqlite::types::Value> = Vec::new();
    if let Some(v) = req.get("first_name").and_then(|v| v.as_str()) {
        set_clauses.push("first_name = ?");
        params.push(v.to_string().into());
    }
    if let Some(v) = req.get("last_name").and_then(|v| v.as_str()) {
        set_clauses.push("last_name = ?");
        params.push(v.to_string().into());
    }
    if let Some(v) = req.get("email").and_then(|v| v.as_str()) {
        set_clauses.push("email = ?");
        params.push(v.to_string().into());
    }

    if set_clauses.is_empty() {
        return Err(ApiError::Validation("No fields to update".into()));
    }

    params.push(user_id.into());
    let sql = format!(
        "UPDATE users SET {} WHERE user_id = ?",
        set_clauses.join(", ")
    );
    state.db.execute(&sql, params_from_iter(params))?;

    Ok(ok("Profile updated successfully"))
}

fn handle_delete_account(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    if req.get("user_id").is_none() || req.get("password").is_none() {
        return Err(ApiError::Validation("Missing required fields".into()));
    }
    let user_id = to_int(req.get("user_id"), 0);
    let password = req
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    let stored_hash: Option<Option<String>> = state
        .db
        .query_row(
            "SELECT password_hash FROM users WHERE user_id = ? AND status = 'active'",
            [user_id],
            |r| r.get(0),
        )
        .optional()?;

    let Some(stored_hash) = stored_hash else {
        return Err(ApiError::NotFound("User not found or inactive".into()));
    };

    let matches = stored_hash
        .map(|hash| auth::verify_password(password, &hash).unwrap_or(false))
        .unwrap_or(false);
    if !matches {
        return Err(ApiError::Auth("Invalid password".into()));
    }

    // Dependent rows first, user row last. An error return drops the
    // transaction, which rolls everything back; partial deletion is never
    // observable.
    let tx = state.db.unchecked_transaction()?;
    tx.execute("DELETE FROM grades WHERE created_by = ?", [user_id])?;
    tx.execute("DELETE FROM tests WHERE created_by = ?", [user_id])?;
    tx.execute("DELETE FROM grade_factors WHERE parent_id = ?", [user_id])?;
    tx.execute(
        "DELETE FROM parent_student_relationships WHERE parent_id = ? OR student_id = ?",
        (user_id, user_id),
    )?;
    tx.execute("DELETE FROM users WHERE user_id = ?", [user_id])?;
    tx.commit()?;

    Ok(ok("Account successfully deleted"))
}
