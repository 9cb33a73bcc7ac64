mod test_support;

use bonifatusd::auth;
use serde_json::json;
use test_support::*;

#[test]
fn login_returns_profile_fields_and_a_decodable_token() {
    let (state, outbox) = new_state();
    let user_id = register_parent(&state, &outbox, "anna@example.com", "pw12345");

    let resp = call(
        &state,
        "login",
        json!({ "email": "anna@example.com", "password": "pw12345" }),
    );
    assert!(succeeded(&resp), "{resp}");
    assert_eq!(message(&resp), "Login successful");
    assert_eq!(resp["data"]["user_id"], json!(user_id));
    assert_eq!(resp["data"]["email"], json!("anna@example.com"));
    assert_eq!(resp["data"]["role"], json!("parent"));

    let token = resp["data"]["token"].as_str().unwrap();
    let claims = auth::decode_token(token, "test-secret").unwrap();
    assert_eq!(claims.sub, user_id);
    assert_eq!(claims.role, "parent");

    let last_login: Option<String> = state
        .db
        .query_row("SELECT last_login FROM users WHERE user_id = ?", [user_id], |r| r.get(0))
        .unwrap();
    assert!(last_login.is_some());
}

#[test]
fn unknown_email_and_wrong_password_are_indistinguishable() {
    let (state, outbox) = new_state();
    register_parent(&state, &outbox, "anna@example.com", "pw12345");

    let miss = call(
        &state,
        "login",
        json!({ "email": "nobody@example.com", "password": "pw12345" }),
    );
    let wrong = call(
        &state,
        "login",
        json!({ "email": "anna@example.com", "password": "other" }),
    );
    assert!(!succeeded(&miss));
    assert!(!succeeded(&wrong));
    assert_eq!(message(&miss), "Invalid credentials");
    assert_eq!(message(&miss), message(&wrong));
}

#[test]
fn unverified_account_cannot_log_in() {
    let (state, _outbox) = new_state();
    call(
        &state,
        "register",
        json!({ "email": "anna@example.com", "password": "pw", "user_type": "parent" }),
    );

    let resp = call(
        &state,
        "login",
        json!({ "email": "anna@example.com", "password": "pw" }),
    );
    assert!(!succeeded(&resp));
    assert_eq!(message(&resp), "Please verify your email first");
}

#[test]
fn student_logs_in_with_parent_email_and_code() {
    let (state, outbox) = new_state();
    let parent_id = register_parent(&state, &outbox, "anna@example.com", "pw");
    let student_id = add_student(&state, parent_id, "7G4K2");

    let resp = call(
        &state,
        "login_with_code",
        json!({ "email": "anna@example.com", "code": "7G4K2" }),
    );
    assert!(succeeded(&resp), "{resp}");
    assert_eq!(resp["data"]["student_id"], json!(student_id));
    assert_eq!(resp["data"]["role"], json!("student"));
    assert_eq!(resp["data"]["uses_parent_email"], json!(true));

    let token = resp["data"]["token"].as_str().unwrap();
    let claims = auth::decode_token(token, "test-secret").unwrap();
    assert_eq!(claims.sub, student_id);
    assert_eq!(claims.role, "student");
}

#[test]
fn code_login_misses_share_one_rejection_message() {
    let (state, outbox) = new_state();
    let parent_id = register_parent(&state, &outbox, "anna@example.com", "pw");
    add_student(&state, parent_id, "7G4K2");

    // Unknown parent email.
    let no_parent = call(
        &state,
        "login_with_code",
        json!({ "email": "nobody@example.com", "code": "7G4K2" }),
    );
    // Known parent, wrong code.
    let no_student = call(
        &state,
        "login_with_code",
        json!({ "email": "anna@example.com", "code": "WRONG" }),
    );
    assert_eq!(message(&no_parent), "Invalid credentials");
    assert_eq!(message(&no_parent), message(&no_student));
}

#[test]
fn login_validation_messages() {
    let (state, _outbox) = new_state();
    let resp = call(&state, "login", json!({ "email": "anna@example.com" }));
    assert_eq!(message(&resp), "Email and password are required");

    let resp = call(&state, "login_with_code", json!({ "code": "7G4K2" }));
    assert_eq!(message(&resp), "Email and code are required");
}
