#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bonifatusd::api::{dispatch, AppState, Request};
use bonifatusd::db;
use bonifatusd::email::Mailer;
use serde_json::{json, Value};

pub struct SentMail {
    pub kind: &'static str,
    pub email: String,
    pub code: String,
}

pub type Outbox = Arc<Mutex<Vec<SentMail>>>;

/// Captures outbound mail instead of sending it; `deliver` controls the
/// reported send result.
pub struct RecordingMailer {
    pub sent: Outbox,
    pub deliver: bool,
}

impl Mailer for RecordingMailer {
    fn send_verification_email(&self, email: &str, code: &str) -> bool {
        self.sent.lock().expect("outbox lock").push(SentMail {
            kind: "verification",
            email: email.to_string(),
            code: code.to_string(),
        });
        self.deliver
    }

    fn send_password_reset_email(&self, email: &str, code: &str) -> bool {
        self.sent.lock().expect("outbox lock").push(SentMail {
            kind: "reset",
            email: email.to_string(),
            code: code.to_string(),
        });
        self.deliver
    }
}

pub fn new_state() -> (AppState, Outbox) {
    let sent: Outbox = Arc::new(Mutex::new(Vec::new()));
    let mailer = RecordingMailer {
        sent: sent.clone(),
        deliver: true,
    };
    let conn = db::open_in_memory().expect("open in-memory db");
    let state = AppState::new(conn, Box::new(mailer), "test-secret".to_string());
    (state, sent)
}

/// Runs one action through the dispatcher, exactly as the HTTP endpoint
/// would after decoding the body.
pub fn call(state: &AppState, action: &str, mut body: Value) -> Value {
    body.as_object_mut()
        .expect("request body must be an object")
        .insert("action".to_string(), json!(action));
    let req = Request::from_body(&body).expect("body carries an action");
    dispatch(state, req)
}

pub fn succeeded(resp: &Value) -> bool {
    resp.get("success").and_then(|v| v.as_bool()).unwrap_or(false)
}

pub fn message(resp: &Value) -> &str {
    resp.get("message").and_then(|v| v.as_str()).unwrap_or("")
}

pub fn last_code(outbox: &Outbox) -> String {
    outbox
        .lock()
        .expect("outbox lock")
        .last()
        .expect("at least one mail sent")
        .code
        .clone()
}

pub fn count(state: &AppState, sql: &str) -> i64 {
    state
        .db
        .query_row(sql, [], |r| r.get(0))
        .expect("count query")
}

/// Register and verify a parent account, returning its user id.
pub fn register_parent(state: &AppState, outbox: &Outbox, email: &str, password: &str) -> i64 {
    let resp = call(
        state,
        "register",
        json!({ "email": email, "password": password, "user_type": "parent" }),
    );
    assert!(succeeded(&resp), "register failed: {resp}");
    let user_id = resp["user_id"].as_i64().expect("user_id in response");

    let code = last_code(outbox);
    let resp = call(state, "verify", json!({ "email": email, "code": code }));
    assert!(succeeded(&resp), "verify failed: {resp}");
    user_id
}

/// Add a student under the given parent, returning its user id.
pub fn add_student(state: &AppState, parent_id: i64, login_code: &str) -> i64 {
    let resp = call(
        state,
        "add_student",
        json!({
            "parent_id": parent_id,
            "first_name": "Kim",
            "last_name": "Student",
            "login_code": login_code
        }),
    );
    assert!(succeeded(&resp), "add_student failed: {resp}");
    resp["data"]["student_id"]
        .as_i64()
        .expect("student_id in response")
}

/// Seed a small catalog: two categories, two subjects (one with a German
/// translation), one grade system with details, defaults and languages.
pub fn seed_catalog(state: &AppState) {
    let stmts = [
        "INSERT INTO subject_categories (category_id, category_name, category_code, display_order)
         VALUES (1, 'Sciences', 'SCI', 1), (2, 'Languages', 'LANG', 2)",
        "INSERT INTO subjects (subject_id, subject_name, category_id, weight, status)
         VALUES (1, 'Mathematics', 1, 2.0, 'active'),
                (2, 'English', 2, 1.0, 'active'),
                (3, 'Retired Subject', 1, 1.0, 'inactive')",
        "INSERT INTO subject_translations (subject_id, language_id, subject_name)
         VALUES (1, 'de', 'Mathematik')",
        "INSERT INTO category_translations (category_id, language_id, name)
         VALUES (1, 'de', 'Naturwissenschaften')",
        "INSERT INTO grade_systems (system_id, system_name, calculation_type, max_grade, min_grade, passing_grade)
         VALUES (1, 'German 1-6', 'inverse', 6.0, 1.0, 4.0)",
        "INSERT INTO grade_system_translations (system_id, language_id, system_name)
         VALUES (1, 'de', 'Deutsches Notensystem')",
        "INSERT INTO grade_details (system_id, grade_value, grade_name, percentage_equivalent)
         VALUES (1, 1.0, 'sehr gut', 100.0), (1, 4.0, 'ausreichend', 50.0)",
        "INSERT INTO default_grades (grade_name, grade_value) VALUES ('A', 1.0)",
        "INSERT INTO default_factors (factor_name, factor_value) VALUES ('homework', 0.5)",
        "INSERT INTO class_factors (class_id, factor_value) VALUES (5, 1.25)",
        "INSERT INTO languages (language_id, language_name, country_code, display_order, is_active)
         VALUES ('en', 'English', 'GB', 1, 1),
                ('de', 'Deutsch', 'DE', 2, 1),
                ('fr', 'Français', 'FR', 3, 0)",
        "INSERT INTO translations (language_id, translation_key, translation_value)
         VALUES ('en', 'app.title', 'Bonifatus'),
                ('en', 'nav.results', 'Results'),
                ('de', 'nav.results', 'Ergebnisse')",
    ];
    for sql in stmts {
        state.db.execute(sql, []).expect("seed catalog");
    }
}
