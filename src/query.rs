//! Filter, sort and pagination parameters for list and count endpoints.

use serde_json::Value;

use crate::error::{ValidationError, ValidationKind};
use crate::types::Identifier;

/// Parameters accepted by every `fetch` call.
///
/// Only the fields that are set end up in the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchParams {
    pub device_id: Option<Identifier>,
    pub model_id: Option<Identifier>,
    /// ISO-8601 lower bound
    pub start_time: Option<String>,
    /// ISO-8601 upper bound
    pub end_time: Option<String>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_desc: Option<bool>,
    /// Cursor echoed from a previous page
    pub next_token: Option<String>,
}

impl FetchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_id(mut self, device_id: impl Into<Identifier>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn model_id(mut self, model_id: impl Into<Identifier>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = Some(start_time.into());
        self
    }

    pub fn end_time(mut self, end_time: impl Into<String>) -> Self {
        self.end_time = Some(end_time.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sort_by(mut self, sort_by: impl Into<String>) -> Self {
        self.sort_by = Some(sort_by.into());
        self
    }

    pub fn sort_desc(mut self, sort_desc: bool) -> Self {
        self.sort_desc = Some(sort_desc);
        self
    }

    pub fn next_token(mut self, next_token: impl Into<String>) -> Self {
        self.next_token = Some(next_token.into());
        self
    }

    /// Query pairs in a fixed order.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(device_id) = &self.device_id {
            query.push(("device_id", device_id.to_string()));
        }
        if let Some(model_id) = &self.model_id {
            query.push(("model_id", model_id.to_string()));
        }
        if let Some(start_time) = &self.start_time {
            query.push(("start_time", start_time.clone()));
        }
        if let Some(end_time) = &self.end_time {
            query.push(("end_time", end_time.clone()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(sort_by) = &self.sort_by {
            query.push(("sort_by", sort_by.clone()));
        }
        if let Some(sort_desc) = self.sort_desc {
            query.push(("sort_desc", sort_desc.to_string()));
        }
        if let Some(next_token) = &self.next_token {
            query.push(("next_token", next_token.clone()));
        }
        query
    }

    /// Filters only; pagination and sorting do not apply to counts.
    pub fn to_count_query(&self) -> Vec<(&'static str, String)> {
        self.to_query()
            .into_iter()
            .filter(|(key, _)| matches!(*key, "device_id" | "model_id" | "start_time" | "end_time"))
            .collect()
    }
}

/// Builds parameters from a loosely typed JSON object.
///
/// `sort_desc` must be a JSON boolean: `"true"` or `1` is rejected rather
/// than coerced. `null` values count as unset.
impl TryFrom<&Value> for FetchParams {
    type Error = ValidationError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let Value::Object(map) = value else {
            return Err(invalid("fetch parameters must be a dictionary"));
        };

        let mut params = FetchParams::default();
        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "device_id" => params.device_id = Some(identifier(key, value)?),
                "model_id" => params.model_id = Some(identifier(key, value)?),
                "start_time" => params.start_time = Some(text(key, value)?),
                "end_time" => params.end_time = Some(text(key, value)?),
                "sort_by" => params.sort_by = Some(text(key, value)?),
                "next_token" => params.next_token = Some(text(key, value)?),
                "limit" => {
                    let limit = value
                        .as_u64()
                        .and_then(|l| u32::try_from(l).ok())
                        .ok_or_else(|| invalid("limit must be a non-negative integer"))?;
                    params.limit = Some(limit);
                }
                "sort_desc" => {
                    let Value::Bool(desc) = value else {
                        return Err(invalid("sort_desc must be a boolean"));
                    };
                    params.sort_desc = Some(*desc);
                }
                other => return Err(invalid(format!("unknown fetch parameter '{other}'"))),
            }
        }
        Ok(params)
    }
}

fn invalid(message: impl Into<String>) -> ValidationError {
    ValidationError::new(ValidationKind::InvalidParameter, message)
}

fn text(key: &str, value: &Value) -> Result<String, ValidationError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("{key} must be a string")))
}

fn identifier(key: &str, value: &Value) -> Result<Identifier, ValidationError> {
    match value {
        Value::String(s) => Ok(Identifier::Text(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(Identifier::Integer)
            .ok_or_else(|| invalid(format!("{key} must be a string or integer"))),
        _ => Err(invalid(format!("{key} must be a string or integer"))),
    }
}
