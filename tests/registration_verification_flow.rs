mod test_support;

use serde_json::json;
use test_support::*;

#[test]
fn register_creates_pending_user_and_mails_a_code() {
    let (state, outbox) = new_state();

    let resp = call(
        &state,
        "register",
        json!({ "email": "anna@example.com", "password": "pw12345", "user_type": "parent" }),
    );
    assert!(succeeded(&resp), "{resp}");
    assert_eq!(
        message(&resp),
        "Registration successful. Check your email for verification code."
    );
    assert_eq!(resp["action"], json!("verify"));
    assert_eq!(resp["email_sent"], json!(true));
    assert!(resp["user_id"].as_i64().is_some());

    let code = last_code(&outbox);
    assert_eq!(code.len(), 6);
    assert_eq!(
        count(&state, "SELECT COUNT(*) FROM users WHERE is_verified = 0"),
        1
    );
}

#[test]
fn register_defaults_first_name_to_email_local_part() {
    let (state, _outbox) = new_state();

    call(
        &state,
        "register",
        json!({ "email": "bea.muster@example.com", "password": "pw", "user_type": "parent" }),
    );
    let first_name: String = state
        .db
        .query_row(
            "SELECT first_name FROM users WHERE email = 'bea.muster@example.com'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(first_name, "bea.muster");
}

#[test]
fn reregistering_unverified_email_overwrites_the_code() {
    let (state, outbox) = new_state();
    let body = json!({ "email": "anna@example.com", "password": "pw", "user_type": "parent" });

    call(&state, "register", body.clone());
    let first_code = last_code(&outbox);

    let resp = call(&state, "register", body);
    assert!(succeeded(&resp), "{resp}");
    assert_eq!(message(&resp), "Verification code resent. Check your email.");
    let second_code = last_code(&outbox);

    // The overwritten code must now be rejected even though it has not
    // expired, unless the resend happened to produce the same digits.
    if first_code != second_code {
        let resp = call(
            &state,
            "verify",
            json!({ "email": "anna@example.com", "code": first_code }),
        );
        assert!(!succeeded(&resp), "{resp}");
    }

    let resp = call(
        &state,
        "verify",
        json!({ "email": "anna@example.com", "code": second_code }),
    );
    assert!(succeeded(&resp), "{resp}");
    assert_eq!(message(&resp), "Email verified successfully");
    assert_eq!(resp["action"], json!("login"));
}

#[test]
fn registering_a_verified_email_points_at_login_or_reset() {
    let (state, outbox) = new_state();
    register_parent(&state, &outbox, "anna@example.com", "pw");

    let resp = call(
        &state,
        "register",
        json!({ "email": "anna@example.com", "password": "pw", "user_type": "parent" }),
    );
    assert!(!succeeded(&resp));
    assert_eq!(message(&resp), "User already exists");
    assert_eq!(resp["action"], json!("login_or_reset"));
}

#[test]
fn wrong_codes_count_down_remaining_attempts() {
    let (state, _outbox) = new_state();
    call(
        &state,
        "register",
        json!({ "email": "anna@example.com", "password": "pw", "user_type": "parent" }),
    );
    // A code the mailer can never have produced.
    let wrong = json!({ "email": "anna@example.com", "code": "no-code" });

    for expected_remaining in [2, 1, 0] {
        let resp = call(&state, "verify", wrong.clone());
        assert!(!succeeded(&resp));
        assert_eq!(resp["remainingAttempts"], json!(expected_remaining));
        assert_eq!(
            message(&resp),
            format!("Incorrect code. You have {expected_remaining} attempts remaining.")
        );
    }

    // Counting continues past zero; the account is never auto-deleted.
    let resp = call(&state, "verify", wrong);
    assert_eq!(resp["remainingAttempts"], json!(-1));
    assert_eq!(count(&state, "SELECT COUNT(*) FROM users"), 1);
}

#[test]
fn expired_code_is_reported_without_consuming_an_attempt() {
    let (state, outbox) = new_state();
    call(
        &state,
        "register",
        json!({ "email": "anna@example.com", "password": "pw", "user_type": "parent" }),
    );
    let code = last_code(&outbox);
    state
        .db
        .execute(
            "UPDATE users SET verification_expiry = '2000-01-01 00:00:00' WHERE email = 'anna@example.com'",
            [],
        )
        .unwrap();

    let resp = call(
        &state,
        "verify",
        json!({ "email": "anna@example.com", "code": code }),
    );
    assert!(!succeeded(&resp));
    assert_eq!(
        message(&resp),
        "Verification code has expired. Please request a new one."
    );
    assert_eq!(
        count(&state, "SELECT failed_attempts FROM users"),
        0,
        "a matching-but-expired code must not count as a failed attempt"
    );
}

#[test]
fn verify_without_pending_registration_is_a_miss() {
    let (state, _outbox) = new_state();
    let resp = call(
        &state,
        "verify",
        json!({ "email": "ghost@example.com", "code": "123456" }),
    );
    assert!(!succeeded(&resp));
    assert_eq!(message(&resp), "No pending verification found for this email");
}

#[test]
fn register_requires_all_three_fields() {
    let (state, _outbox) = new_state();
    let resp = call(
        &state,
        "register",
        json!({ "email": "anna@example.com", "password": "pw" }),
    );
    assert!(!succeeded(&resp));
    assert_eq!(message(&resp), "Email, password and user type are required");

    // JSON null counts as absent.
    let resp = call(
        &state,
        "register",
        json!({ "email": "anna@example.com", "password": "pw", "user_type": null }),
    );
    assert_eq!(message(&resp), "Email, password and user type are required");
}

#[test]
fn failed_email_delivery_still_registers_the_user() {
    let (state, _outbox) = {
        let sent: Outbox = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mailer = RecordingMailer {
            sent: sent.clone(),
            deliver: false,
        };
        let conn = bonifatusd::db::open_in_memory().unwrap();
        (
            bonifatusd::api::AppState::new(conn, Box::new(mailer), "test-secret".into()),
            sent,
        )
    };

    let resp = call(
        &state,
        "register",
        json!({ "email": "anna@example.com", "password": "pw", "user_type": "parent" }),
    );
    assert!(succeeded(&resp), "{resp}");
    assert_eq!(resp["email_sent"], json!(false));
    assert_eq!(count(&state, "SELECT COUNT(*) FROM users"), 1);
}
