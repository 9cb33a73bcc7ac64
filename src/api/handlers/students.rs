use rusqlite::{params_from_iter, OptionalExtension};
use serde_json::{json, Value};

use crate::api::error::{ok_data, ok_with, ApiError};
use crate::api::sanitize::{row_to_json, to_int, to_string};
use crate::api::types::{AppState, Request};
use crate::auth;

pub fn try_handle(state: &AppState, req: &Request) -> Option<Result<Value, ApiError>> {
    match req.action.as_str() {
        "add_student" => Some(handle_add_student(state, req)),
        "update_student" => Some(handle_update_student(state, req)),
        "get_parent_students" => Some(handle_get_parent_students(state, req)),
        "get_parent_info" => Some(handle_get_parent_info(state, req)),
        _ => None,
    }
}

fn login_code_in_use(state: &AppState, code: &str, exclude_user: Option<i64>) -> Result<bool, ApiError> {
    let holder: Option<i64> = match exclude_user {
        Some(user_id) => state
            .db
            .query_row(
                "SELECT user_id FROM users WHERE login_code = ? AND user_id != ?",
                (code, user_id),
                |r| r.get(0),
            )
            .optional()?,
        None => state
            .db
            .query_row(
                "SELECT user_id FROM users WHERE login_code = ?",
                [code],
                |r| r.get(0),
            )
            .optional()?,
    };
    Ok(holder.is_some())
}

fn handle_add_student(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    for field in ["parent_id", "first_name", "last_name", "login_code"] {
        if req.get(field).is_none() {
            return Err(ApiError::Validation(format!(
                "Missing required field: {field}"
            )));
        }
    }
    let parent_id = to_int(req.get("parent_id"), 0);
    let first_name = to_string(req.get("first_name"), "");
    let last_name = to_string(req.get("last_name"), "");
    let login_code = to_string(req.get("login_code"), "");

    // Student accounts ride on the parent's mailbox; the address is derived
    // and never mailed to.
    let student_email = format!("student_{parent_id}_{login_code}@parent.bonifatus.com");

    // Codes are a credential, so uniqueness is system-wide, not per-parent.
    if login_code_in_use(state, &login_code, None)? {
        return Err(ApiError::Conflict("Login code already in use".into()));
    }

    let tx = state.db.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO users (
            email, first_name, last_name, role, parent_id, login_code,
            status, is_verified, creation_date
        ) VALUES (?, ?, ?, 'student', ?, ?, 'active', 1, ?)",
        (
            &student_email,
            &first_name,
            &last_name,
            parent_id,
            &login_code,
            auth::now_timestamp(),
        ),
    )?;
    let student_id = tx.last_insert_rowid();

    tx.execute(
        "INSERT INTO parent_student_relationships (parent_id, student_id, status, created_at)
         VALUES (?, ?, 'active', ?)",
        (parent_id, student_id, auth::now_timestamp()),
    )?;
    tx.commit()?;

    Ok(ok_with(
        "Student added successfully",
        json!({
            "student_id": student_id,
            "email": student_email,
            "login_code": login_code
        }),
    ))
}

fn handle_update_student(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    if req.get("student_id").is_none() {
        return Err(ApiError::Validation("Student ID is required".into()));
    }
    let student_id = to_int(req.get("student_id"), 0);

    let exists: Option<i64> = state
        .db
        .query_row(
            "SELECT user_id FROM users WHERE user_id = ?",
            [student_id],
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(ApiError::NotFound("Student not found".into()));
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

    // A login-code change may carry a matching derived-email change; the
    // email is never updated on its own.
    if req.get("login_code").is_some() {
        let login_code = to_string(req.get("login_code"), "");
        if login_code_in_use(state, &login_code, Some(student_id))? {
            return Err(ApiError::Conflict("Login code is already in use".into()));
        }
        set_clauses.push("login_code = ?");
        params.push(login_code.into());

        if let Some(email) = req.get("email").and_then(|v| v.as_str()) {
            set_clauses.push("email = ?");
            params.push(email.to_string().into());
        }
    }

    if !set_clauses.is_empty() {
        params.push(student_id.into());
        let sql = format!(
            "UPDATE users SET {} WHERE user_id = ?",
            set_clauses.join(", ")
        );
        state.db.execute(&sql, params_from_iter(params))?;
    }

    let mut updated = state.db.query_row(
        "SELECT * FROM users WHERE user_id = ?",
        [student_id],
        |r| row_to_json(r),
    )?;
    if let Some(obj) = updated.as_object_mut() {
        for sensitive in [
            "password_hash",
            "verification_code",
            "verification_expiry",
            "reset_token",
            "reset_token_expiry",
        ] {
            obj.remove(sensitive);
        }
    }

    Ok(ok_with("Student updated successfully", updated))
}

fn handle_get_parent_students(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    if req.get("parent_id").is_none() {
        return Err(ApiError::Validation("Parent ID is required".into()));
    }
    let parent_id = to_int(req.get("parent_id"), 0);

    let mut stmt = state.db.prepare(
        "SELECT
            u.user_id AS student_id,
            u.first_name,
            u.last_name,
            u.email,
            u.login_code,
            CASE WHEN u.parent_id IS NOT NULL THEN 1 ELSE 0 END AS uses_parent_email,
            u.creation_date AS created_at
         FROM users u
         INNER JOIN parent_student_relationships r ON u.user_id = r.student_id
         WHERE r.parent_id = ?
           AND r.status = 'active'
           AND u.status = 'active'
         ORDER BY u.creation_date DESC",
    )?;
    let students = stmt
        .query_map([parent_id], |r| row_to_json(r))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ok_data(Value::Array(students)))
}

fn handle_get_parent_info(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    if req.get("student_id").is_none() {
        return Err(ApiError::Validation("Student ID is required".into()));
    }
    let student_id = to_int(req.get("student_id"), 0);

    let parent = state
        .db
        .query_row(
            "SELECT
                u.user_id,
                u.email,
                u.first_name,
                u.last_name,
                r.created_at AS relationship_since
             FROM users u
             INNER JOIN parent_student_relationships r ON u.user_id = r.parent_id
             WHERE r.student_id = ?
               AND r.status = 'active'
               AND u.status = 'active'
               AND u.role = 'parent'
             LIMIT 1",
            [student_id],
            |r| row_to_json(r),
        )
        .optional()?;

    match parent {
        Some(parent) => Ok(ok_data(parent)),
        None => Err(ApiError::NotFound("No parent found".into())),
    }
}
