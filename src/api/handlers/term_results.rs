use rusqlite::OptionalExtension;
use serde_json::{json, Value};

use crate::api::error::{ok_with, ApiError};
use crate::api::sanitize::{row_to_json, sanitize_numeric_fields, to_float, to_int, to_string};
use crate::api::types::{AppState, Request};
use crate::auth;

pub fn try_handle(state: &AppState, req: &Request) -> Option<Result<Value, ApiError>> {
    match req.action.as_str() {
        "save_term_results" => Some(handle_save_term_results(state, req)),
        "get_term_results" => Some(handle_get_term_results(state, req)),
        _ => None,
    }
}

fn handle_save_term_results(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    if req.get("student_id").is_none() || req.get("action_type").is_none() {
        return Err(ApiError::Validation("Missing required fields".into()));
    }
    let student_id = to_int(req.get("student_id"), 0);
    let action_type = to_string(req.get("action_type"), "");

    let school_year = to_string(req.get("school_year"), "");
    let term = to_string(req.get("term"), "");
    let created_by = to_int(req.get("created_by"), 0);

    // Test upsert, grade wipe and grade inserts share one transaction; an
    // error return drops it and rolls the whole batch back.
    let tx = state.db.unchecked_transaction()?;

    let test_id = match action_type.as_str() {
        "create" => {
            tx.execute(
                "INSERT INTO tests (
                    student_id, school_year, term, total_score, average_score,
                    bonus_points, grade_system_id, status, created_by, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, 'final', ?, ?)",
                (
                    student_id,
                    &school_year,
                    &term,
                    to_float(req.get("total_score"), 0.0),
                    to_float(req.get("average_score"), 0.0),
                    to_float(req.get("bonus_points"), 0.0),
                    to_int(req.get("grade_system_id"), 0),
                    created_by,
                    auth::now_timestamp(),
                ),
            )?;
            tx.last_insert_rowid()
        }
        "update" => {
            let test_id = to_int(req.get("test_id"), 0);
            let owned: Option<i64> = tx
                .query_row(
                    "SELECT test_id FROM tests WHERE test_id = ? AND student_id = ?",
                    (test_id, student_id),
                    |r| r.get(0),
                )
                .optional()?;
            if owned.is_none() {
                return Err(ApiError::NotFound(
                    "Test record not found or unauthorized".into(),
                ));
            }

            // Full replacement: the old grade set goes away before the new
            // one lands, within the same transaction.
            tx.execute("DELETE FROM grades WHERE test_id = ?", [test_id])?;
            test_id
        }
        _ => return Err(ApiError::Validation("Invalid action type".into())),
    };

    let grades = req
        .get("grades")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO grades (
                test_id, student_id, subject_id, subject, grade, grade_name,
                percentage_equivalent, term_type, school_year, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for grade in &grades {
            stmt.execute((
                test_id,
                student_id,
                to_int(grade.get("subject_id"), 0),
                to_string(grade.get("subject"), ""),
                to_float(grade.get("grade"), 0.0),
                to_string(grade.get("grade_name"), ""),
                to_float(grade.get("percentage_equivalent"), 0.0),
                &term,
                &school_year,
                created_by,
                auth::now_timestamp(),
            ))?;
        }
    }

    tx.commit()?;

    Ok(ok_with(
        "Results saved successfully",
        json!({
            "test_id": test_id,
            "action": action_type,
            "grades_saved": grades.len()
        }),
    ))
}

fn handle_get_term_results(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    if req.get("student_id").is_none() {
        return Err(ApiError::Validation("Student ID required".into()));
    }
    let student_id = to_int(req.get("student_id"), 0);

    let mut tests_stmt = state.db.prepare(
        "SELECT * FROM tests
         WHERE student_id = ?
         ORDER BY school_year DESC, term DESC",
    )?;
    let tests = tests_stmt
        .query_map([student_id], |r| row_to_json(r))?
        .collect::<Result<Vec<_>, _>>()?;

    // One grade fetch per test; fine at this scale.
    let mut grades_stmt = state
        .db
        .prepare("SELECT * FROM grades WHERE test_id = ?")?;
    let mut results = Vec::with_capacity(tests.len());
    for mut test in tests {
        let test_id = to_int(test.get("test_id"), 0);
        let grades = grades_stmt
            .query_map([test_id], |r| row_to_json(r))?
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(obj) = test.as_object_mut() {
            obj.insert("grades".to_string(), Value::Array(grades));
        }
        results.push(test);
    }

    Ok(ok_with(
        "Results retrieved successfully",
        sanitize_numeric_fields(Value::Array(results)),
    ))
}
