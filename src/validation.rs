//! Payload validators.
//!
//! Each validator is a pure function over the caller's value. They run
//! before a request body is assembled, so a rejected payload never touches
//! the network.

use serde_json::Value;

use crate::error::{ValidationError, ValidationKind};
use crate::types::{Identifier, ENVIRONMENT_KEYS};

/// Checks a detection bounding box: a JSON array of exactly four numbers.
///
/// Integers and floats may be mixed. Range is not checked.
pub fn bounding_box_detection(value: &Value) -> Result<&Value, ValidationError> {
    let invalid = || {
        ValidationError::new(
            ValidationKind::BoundingBox,
            "bounding_box must be a list of 4 float values [x1, y1, x2, y2]",
        )
    };

    let Value::Array(coords) = value else {
        return Err(invalid());
    };
    if coords.len() != 4 || !coords.iter().all(Value::is_number) {
        return Err(invalid());
    }
    Ok(value)
}

/// Classification bounding boxes accept any representation.
///
/// `None` and JSON `null` both mean the field is omitted.
pub fn bounding_box_classification(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

/// Checks a location: an object holding `lat` and `long`.
pub fn location(value: &Value) -> Result<&Value, ValidationError> {
    let Value::Object(map) = value else {
        return Err(ValidationError::new(
            ValidationKind::Location,
            "location must be a dictionary",
        ));
    };
    if !map.contains_key("lat") || !map.contains_key("long") {
        return Err(ValidationError::new(
            ValidationKind::Location,
            "location must contain 'lat' and 'long' keys",
        ));
    }
    Ok(value)
}

/// Checks an environment reading for every required key.
///
/// The error names all missing keys. Extra keys and value types are left
/// alone.
pub fn environment_data<'a>(value: &'a Value, field: &str) -> Result<&'a Value, ValidationError> {
    let Value::Object(map) = value else {
        return Err(ValidationError::new(
            ValidationKind::EnvironmentData,
            format!("{field} must be a dictionary"),
        ));
    };

    let missing: Vec<&str> = ENVIRONMENT_KEYS
        .iter()
        .copied()
        .filter(|key| !map.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::new(
            ValidationKind::EnvironmentData,
            format!(
                "{field} must contain all required keys: {}. Missing: {}",
                ENVIRONMENT_KEYS.join(", "),
                missing.join(", ")
            ),
        ));
    }
    Ok(value)
}

pub fn non_empty_bytes<'a>(value: &'a [u8], field: &str) -> Result<&'a [u8], ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(
            ValidationKind::EmptyPayload,
            format!("{field} cannot be empty"),
        ));
    }
    Ok(value)
}

pub fn required_string<'a>(value: &'a str, field: &str) -> Result<&'a str, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(
            ValidationKind::MissingField,
            format!("{field} is required"),
        ));
    }
    Ok(value)
}

pub fn required_identifier<'a>(
    value: &'a Identifier,
    field: &str,
) -> Result<&'a Identifier, ValidationError> {
    if let Identifier::Text(text) = value {
        required_string(text, field)?;
    }
    Ok(value)
}
