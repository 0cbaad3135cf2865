//! Presence checks on request payloads
//!
//! Only presence is checked. Types and values are the broker's business.

use serde_json::Value;

use super::error::ApiError;

/// Require `payload` to be an object carrying every field in `fields`
///
/// A field counts as missing when it is absent, `null`, or an empty string.
pub fn require_fields(payload: &Value, fields: &[&str]) -> Result<(), ApiError> {
    let object = payload
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("request body must be a JSON object".to_string()))?;

    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|field| match object.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::missing(missing))
    }
}

/// Require `payload` to be a JSON array with at least one element
pub fn require_non_empty_array(payload: &Value) -> Result<(), ApiError> {
    match payload.as_array() {
        Some(items) if !items.is_empty() => Ok(()),
        Some(_) => Err(ApiError::BadRequest(
            "request body must be a non-empty JSON array of orders".to_string(),
        )),
        None => Err(ApiError::BadRequest(
            "request body must be a JSON array of orders".to_string(),
        )),
    }
}
