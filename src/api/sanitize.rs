use rusqlite::types::ValueRef;
use rusqlite::Row;
use serde_json::{json, Map, Value};

/// Convert-or-default coercion. Invalid input becomes the default, never an
/// error; this is the boundary every wire value crosses before reaching a
/// SQL parameter or a typed response field.
pub fn to_int(value: Option<&Value>, default: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                // Accept whole-number floats, nothing fractional.
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 => f as i64,
                    _ => default,
                }
            }
        }
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

pub fn to_float(value: Option<&Value>, default: f64) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

pub fn to_string(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => default.to_string(),
    }
}

pub fn to_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => false,
            Some(1) => true,
            _ => default,
        },
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => true,
            "0" | "false" | "off" | "no" | "" => false,
            _ => default,
        },
        _ => default,
    }
}

/// Blanket pass over bulk query output: any string that reads as a number
/// becomes one (`.` present means float, otherwise int). Applied to whole
/// result trees, not per-field.
pub fn sanitize_numeric_fields(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize_numeric_fields(v)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(sanitize_numeric_fields).collect())
        }
        Value::String(s) => coerce_numeric_string(s),
        other => other,
    }
}

fn coerce_numeric_string(s: String) -> Value {
    let t = s.trim();
    if t.contains('.') {
        if let Ok(f) = t.parse::<f64>() {
            return json!(f);
        }
    } else if let Ok(i) = t.parse::<i64>() {
        return json!(i);
    }
    Value::String(s)
}

/// Fixed projection for translated subject rows. Missing category order
/// defaults to 999 (sorts last), missing weight to 1.0.
pub fn clean_subject(row: &Value) -> Value {
    json!({
        "subject_id": to_int(row.get("subject_id"), 0),
        "subject_name": to_string(row.get("subject_name"), ""),
        "category_name": to_string(row.get("category_name"), ""),
        "category_name_translated": to_string(row.get("category_name_translated"), ""),
        "category_order": to_int(row.get("category_order"), 999),
        "weight": to_float(row.get("weight"), 1.0),
    })
}

pub fn clean_grade_system(row: &Value) -> Value {
    json!({
        "system_id": to_int(row.get("system_id"), 0),
        "system_name": to_string(row.get("system_name"), ""),
        "calculation_type": to_string(row.get("calculation_type"), ""),
        "max_grade": to_float(row.get("max_grade"), 0.0),
        "min_grade": to_float(row.get("min_grade"), 0.0),
        "passing_grade": to_float(row.get("passing_grade"), 0.0),
    })
}

/// Dynamic row -> JSON object, for `SELECT *` style fetches.
pub fn row_to_json(row: &Row) -> rusqlite::Result<Value> {
    let names: Vec<String> = row
        .as_ref()
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut map = Map::new();
    for (i, name) in names.iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(n) => json!(n),
            ValueRef::Real(f) => json!(f),
            ValueRef::Text(t) => json!(String::from_utf8_lossy(t)),
            ValueRef::Blob(_) => Value::Null,
        };
        map.insert(name.clone(), value);
    }
    Ok(Value::Object(map))
}
