use serde_json::{json, Map, Value};

use crate::api::error::{ok_data, ok_with, ApiError};
use crate::api::sanitize::{clean_grade_system, clean_subject, row_to_json, sanitize_numeric_fields, to_string};
use crate::api::types::{AppState, Request};

pub fn try_handle(state: &AppState, req: &Request) -> Option<Result<Value, ApiError>> {
    match req.action.as_str() {
        "get_bonus_factors" => Some(handle_get_bonus_factors(state)),
        "get_subjects_translated" => Some(handle_get_subjects_translated(state, req)),
        "get_grade_systems_translated" => Some(handle_get_grade_systems_translated(state, req)),
        "get_translations" => Some(handle_get_translations(state, req)),
        _ => None,
    }
}

fn fetch_all(state: &AppState, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Value>, ApiError> {
    let mut stmt = state.db.prepare(sql)?;
    let rows = stmt
        .query_map(params, |r| row_to_json(r))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn handle_get_bonus_factors(state: &AppState) -> Result<Value, ApiError> {
    let subjects = fetch_all(
        state,
        "SELECT
            s.*,
            sc.category_name,
            sc.category_code,
            sc.display_order AS category_order
         FROM subjects s
         LEFT JOIN subject_categories sc ON s.category_id = sc.category_id
         WHERE s.status = 'active'
         ORDER BY sc.display_order, s.subject_name",
        &[],
    )?;
    let grade_details = fetch_all(
        state,
        "SELECT * FROM grade_details ORDER BY system_id, grade_value",
        &[],
    )?;
    let grade_systems = fetch_all(state, "SELECT * FROM grade_systems ORDER BY system_id", &[])?;
    let default_grades = fetch_all(state, "SELECT * FROM default_grades ORDER BY grade_id", &[])?;
    let default_factors = fetch_all(state, "SELECT * FROM default_factors ORDER BY factor_id", &[])?;
    let class_factors = fetch_all(state, "SELECT * FROM class_factors ORDER BY class_id", &[])?;

    // Response keys keep the legacy `bon_` table prefix; existing clients
    // parse these names.
    let data = sanitize_numeric_fields(json!({
        "bon_subjects": subjects,
        "bon_grade_details": grade_details,
        "bon_grade_system": grade_systems,
        "bon_default_grades": default_grades,
        "bon_default_factors": default_factors,
        "bon_class_factors": class_factors
    }));

    Ok(ok_with("Bonus factors retrieved successfully", data))
}

fn handle_get_subjects_translated(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    let language_id = to_string(req.get("language_id"), "en");

    // Translation rows overlay the base names; a missing translation falls
    // back to the base value via COALESCE.
    let subjects = fetch_all(
        state,
        "SELECT
            s.subject_id,
            COALESCE(st.subject_name, s.subject_name) AS subject_name,
            sc.category_name,
            COALESCE(ct.name, sc.category_name) AS category_name_translated,
            sc.display_order AS category_order,
            s.weight
         FROM subjects s
         LEFT JOIN subject_translations st
            ON s.subject_id = st.subject_id AND st.language_id = ?
         LEFT JOIN subject_categories sc
            ON s.category_id = sc.category_id
         LEFT JOIN category_translations ct
            ON sc.category_id = ct.category_id AND ct.language_id = ?
         WHERE s.status = 'active'
         ORDER BY sc.display_order, s.subject_name",
        &[&language_id, &language_id],
    )?;

    let subjects: Vec<Value> = subjects.iter().map(clean_subject).collect();
    Ok(ok_data(json!({ "subjects": subjects })))
}

fn handle_get_grade_systems_translated(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    let language_id = to_string(req.get("language_id"), "en");

    let systems = fetch_all(
        state,
        "SELECT
            gs.*,
            COALESCE(gst.system_name, gs.system_name) AS system_name
         FROM grade_systems gs
         LEFT JOIN grade_system_translations gst
            ON gs.system_id = gst.system_id AND gst.language_id = ?
         ORDER BY gs.system_id",
        &[&language_id],
    )?;

    let systems: Vec<Value> = systems.iter().map(clean_grade_system).collect();
    Ok(ok_data(json!({ "grade_systems": systems })))
}

fn handle_get_translations(state: &AppState, req: &Request) -> Result<Value, ApiError> {
    let language_id = to_string(req.get("language_id"), "en");

    let mut stmt = state.db.prepare(
        "SELECT translation_key, translation_value
         FROM translations
         WHERE language_id = ?",
    )?;
    let pairs = stmt
        .query_map([&language_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let mut translations = Map::new();
    for (key, value) in pairs {
        translations.insert(key, Value::String(value));
    }

    let languages = fetch_all(
        state,
        "SELECT language_id, language_name, country_code, display_order, is_active
         FROM languages
         WHERE is_active = 1
         ORDER BY display_order",
        &[],
    )?;

    Ok(ok_data(json!({
        "translations": translations,
        "languages": languages
    })))
}
