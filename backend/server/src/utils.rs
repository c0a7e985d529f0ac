use axum::extract::rejection::JsonRejection;
use serde_json::{Number, Value};

use crate::error::AppError;

/// A required field in the truthy sense: present and not null, `false`, `0` or `""`.
pub fn filled(field: Option<Value>) -> Option<Value> {
    field.filter(|value| match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        _ => true,
    })
}

/// Present, not null and not `""`. Unlike [`filled`], `0` and `false` pass.
pub fn present(field: Option<Value>) -> Option<Value> {
    field.filter(|value| !matches!(value, Value::Null) && value.as_str() != Some(""))
}

/// Text fields take numbers and booleans as their text form.
pub fn text(field: &str, value: Value) -> Result<String, AppError> {
    match value {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(cast_error(field, "text", &other)),
    }
}

/// Numeric fields take numeric strings and booleans as well as numbers.
pub fn number(field: &str, value: Value) -> Result<Number, AppError> {
    match value {
        Value::Number(number) => Ok(number),
        Value::Bool(flag) => Ok(Number::from(u8::from(flag))),
        Value::String(ref text) => {
            let trimmed = text.trim();

            trimmed
                .parse::<i64>()
                .map(Number::from)
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(Number::from_f64))
                .ok_or_else(|| cast_error(field, "a number", &value))
        }
        other => Err(cast_error(field, "a number", &other)),
    }
}

fn cast_error(field: &str, expected: &str, value: &Value) -> AppError {
    AppError::MalformedPayload(format!("{field}: expected {expected}, got {value}"))
}

pub fn malformed(rejection: JsonRejection) -> AppError {
    AppError::MalformedPayload(rejection.body_text())
}
