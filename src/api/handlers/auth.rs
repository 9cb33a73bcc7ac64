use rusqlite::OptionalExtension;
use serde_json::{json, Value};

use crate::api::error::{fail, ok_with, ApiError};
use crate::api::sanitize::to_string;
use crate::api::types::{AppState, Request};
use crate::auth;

pub fn try_handle(state: &AppState, req: &Request) -> Option<Result<Value, ApiError>> {
    match req.action.as_str() {
        "register" => Some(handle_register(state, req)),
        "verify" => Some(handle_verify(state, req)),
        "login" => Some(handle_login(state, req)),
        "login_with_code" => Some(handle_code_login(state, req)),
        _ => None,
    }
}

fn handle_register(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    let (Some(email), Some(password), Some(user_type)) = (
        req.get("email").and_then(|v| v.as_str()),
        req.get("password").and_then(|v| v.as_str()),
        req.get("user_type").and_then(|v| v.as_str()),
    ) else {
        return Err(ApiError::Validation(
            "Email, password and user type are required".into(),
        ));
    };

    let existing: Option<(i64, bool)> = state
        .db
        .query_row(
            "SELECT user_id, is_verified FROM users WHERE email = ?",
            [email],
            |r| Ok((r.get(0)?, r.get::<_, i64>(1)? != 0)),
        )
        .optional()?;

    if let Some((user_id, is_verified)) = existing {
        if is_verified {
            return Ok(json!({
                "success": false,
                "message": "User already exists",
                "action": "login_or_reset"
            }));
        }

        // Pending registration: overwrite the previous code so only the
        // latest one is accepted.
        let code = auth::generate_code();
        let expires_at = auth::code_expiry();
        state.db.execute(
            "UPDATE users SET verification_code = ?, verification_expiry = ? WHERE user_id = ?",
            (&code, &expires_at, user_id),
        )?;
        let email_sent = state.mailer.send_verification_email(email, &code);
        if !email_sent {
            tracing::warn!(email, "verification email resend failed");
        }
        return Ok(json!({
            "success": true,
            "message": "Verification code resent. Check your email.",
            "action": "verify",
            "user_id": user_id,
            "email_sent": email_sent
        }));
    }

    // Fall back to the email local part when no name was supplied.
    let local_part = email.split('@').next().unwrap_or(email);
    let first_name = to_string(req.get("first_name"), local_part);
    let last_name = to_string(req.get("last_name"), "");

    let code = auth::generate_code();
    let expires_at = auth::code_expiry();
    let password_hash = auth::hash_password(password)?;

    state.db.execute(
        "INSERT INTO users (
            email, password_hash, first_name, last_name, role,
            verification_code, verification_expiry, is_verified, creation_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)",
        (
            email,
            &password_hash,
            &first_name,
            &last_name,
            user_type,
            &code,
            &expires_at,
            auth::now_timestamp(),
        ),
    )?;
    let user_id = state.db.last_insert_rowid();

    // A failed send never undoes the insert; the flag tells the client.
    let email_sent = state.mailer.send_verification_email(email, &code);
    if !email_sent {
        tracing::warn!(email, "verification email send failed");
    }

    Ok(json!({
        "success": true,
        "message": "Registration successful. Check your email for verification code.",
        "action": "verify",
        "user_id": user_id,
        "email_sent": email_sent
    }))
}

fn handle_verify(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    let (Some(email), Some(code)) = (
        req.get("email").and_then(|v| v.as_str()),
        req.get("code").and_then(|v| v.as_str()),
    ) else {
        return Err(ApiError::Validation(
            "Email and verification code are required".into(),
        ));
    };

    let pending: Option<(i64, Option<String>, Option<String>, i64)> = state
        .db
        .query_row(
            "SELECT user_id, verification_code, verification_expiry, failed_attempts
             FROM users
             WHERE email = ? AND is_verified = 0",
            [email],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;

    let Some((user_id, stored_code, expiry, failed_attempts)) = pending else {
        return Err(ApiError::NotFound(
            "No pending verification found for this email".into(),
        ));
    };

    if stored_code.as_deref() != Some(code) {
        let new_failed = failed_attempts + 1;
        let remaining = 3 - new_failed;
        state.db.execute(
            "UPDATE users SET failed_attempts = ? WHERE user_id = ?",
            (new_failed, user_id),
        )?;
        return Ok(json!({
            "success": false,
            "message": format!("Incorrect code. You have {remaining} attempts remaining."),
            "remainingAttempts": remaining
        }));
    }

    // Checked only after the code matches, so an expired code never
    // consumes an attempt.
    let expired = match expiry {
        Some(ts) => ts < auth::now_timestamp(),
        None => true,
    };
    if expired {
        return Ok(fail(
            "Verification code has expired. Please request a new one.",
        ));
    }

    state.db.execute(
        "UPDATE users
         SET is_verified = 1,
             verification_code = NULL,
             verification_expiry = NULL,
             failed_attempts = 0
         WHERE user_id = ?",
        [user_id],
    )?;

    Ok(json!({
        "success": true,
        "message": "Email verified successfully",
        "action": "login"
    }))
}

fn handle_login(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    let (Some(email), Some(password)) = (
        req.get("email").and_then(|v| v.as_str()),
        req.get("password").and_then(|v| v.as_str()),
    ) else {
        return Err(ApiError::Validation(
            "Email and password are required".into(),
        ));
    };

    let user: Option<(i64, Option<String>, bool, String, String, String, String)> = state
        .db
        .query_row(
            "SELECT user_id, password_hash, is_verified, first_name, last_name, email, role
             FROM users
             WHERE email = ? AND status = 'active'",
            [email],
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get::<_, i64>(2)? != 0,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                ))
            },
        )
        .optional()?;

    // Unknown email and wrong password share one message by design.
    let Some((user_id, password_hash, is_verified, first_name, last_name, email, role)) = user
    else {
        return Err(ApiError::Auth("Invalid credentials".into()));
    };

    if !is_verified {
        return Err(ApiError::Auth("Please verify your email first".into()));
    }

    let matches = password_hash
        .map(|hash| auth::verify_password(password, &hash).unwrap_or(false))
        .unwrap_or(false);
    if !matches {
        return Err(ApiError::Auth("Invalid credentials".into()));
    }

    state.db.execute(
        "UPDATE users SET last_login = ? WHERE user_id = ?",
        (auth::now_timestamp(), user_id),
    )?;

    let token = auth::issue_token(user_id, &role, &state.token_secret)?;
    Ok(ok_with(
        "Login successful",
        json!({
            "user_id": user_id,
            "token": token,
            "first_name": first_name,
            "last_name": last_name,
            "email": email,
            "role": role
        }),
    ))
}

fn handle_code_login(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    let (Some(email), Some(code)) = (
        req.get("email").and_then(|v| v.as_str()),
        req.get("code").and_then(|v| v.as_str()),
    ) else {
        return Err(ApiError::Validation("Email and code are required".into()));
    };

    // Two-step resolve: parent by email, then student by code under that
    // parent. Either miss yields the same generic rejection.
    let parent_id: Option<i64> = state
        .db
        .query_row(
            "SELECT user_id FROM users
             WHERE email = ? AND role = 'parent' AND status = 'active'",
            [email],
            |r| r.get(0),
        )
        .optional()?;

    let Some(parent_id) = parent_id else {
        return Err(ApiError::Auth("Invalid credentials".into()));
    };

    let student: Option<(i64, String, String, String)> = state
        .db
        .query_row(
            "SELECT user_id, first_name, last_name, email
             FROM users
             WHERE parent_id = ? AND login_code = ?
               AND status = 'active' AND role = 'student'",
            (parent_id, code),
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;

    let Some((student_id, first_name, last_name, student_email)) = student else {
        return Err(ApiError::Auth("Invalid credentials".into()));
    };

    state.db.execute(
        "UPDATE users SET last_login = ? WHERE user_id = ?",
        (auth::now_timestamp(), student_id),
    )?;

    let token = auth::issue_token(student_id, "student", &state.token_secret)?;
    Ok(ok_with(
        "Login successful",
        json!({
            "student_id": student_id,
            "token": token,
            "first_name": first_name,
            "last_name": last_name,
            "email": student_email,
            "role": "student",
            "uses_parent_email": true
        }),
    ))
}
