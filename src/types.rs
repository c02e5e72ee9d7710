//! Common types used throughout the Sensing Garden client.
//!
//! This module contains the value types callers use to describe records
//! (identifiers, confidences, locations, environment readings, candidate
//! sets) and the response shapes returned by the API. The typed helpers all
//! convert into the `serde_json::Value` form the validators operate on, so
//! callers may use either.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a device or model.
///
/// The API accepts either a string or an integer and the client forwards
/// whichever the caller supplied without coercion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    /// Integer identifier, sent as a JSON number
    Integer(i64),
    /// Text identifier, sent as a JSON string
    Text(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Integer(i) => write!(f, "{i}"),
            Identifier::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::Text(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::Text(value)
    }
}

impl From<&String> for Identifier {
    fn from(value: &String) -> Self {
        Identifier::Text(value.clone())
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Identifier::Integer(value)
    }
}

impl From<i32> for Identifier {
    fn from(value: i32) -> Self {
        Identifier::Integer(value.into())
    }
}

impl From<u32> for Identifier {
    fn from(value: u32) -> Self {
        Identifier::Integer(value.into())
    }
}

/// A confidence score as supplied by the caller.
///
/// `"0.95"` stays a string and `0.95` stays a number on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confidence {
    Number(serde_json::Number),
    Text(String),
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(Confidence::Number)
            .unwrap_or_else(|| Confidence::Text(value.to_string()))
    }
}

impl From<f32> for Confidence {
    fn from(value: f32) -> Self {
        Confidence::from(f64::from(value))
    }
}

impl From<i64> for Confidence {
    fn from(value: i64) -> Self {
        Confidence::Number(value.into())
    }
}

impl From<i32> for Confidence {
    fn from(value: i32) -> Self {
        Confidence::Number(value.into())
    }
}

impl From<&str> for Confidence {
    fn from(value: &str) -> Self {
        Confidence::Text(value.to_string())
    }
}

impl From<String> for Confidence {
    fn from(value: String) -> Self {
        Confidence::Text(value)
    }
}

/// GPS position attached to a record.
///
/// Serializes to `{"lat": .., "long": .., "alt": ..}`; extra keys are kept
/// alongside the coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub long: f64,
    /// Altitude in meters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
    /// Additional keys forwarded untouched (accuracy, source, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Location {
    pub fn new(lat: f64, long: f64) -> Self {
        Self {
            lat,
            long,
            alt: None,
            extra: Map::new(),
        }
    }

    pub fn with_alt(mut self, alt: f64) -> Self {
        self.alt = Some(alt);
        self
    }
}

impl From<Location> for Value {
    fn from(location: Location) -> Self {
        serde_json::to_value(location).unwrap_or(Value::Null)
    }
}

/// Keys every environment reading must carry.
pub const ENVIRONMENT_KEYS: [&str; 8] = [
    "pm1p0",
    "pm2p5",
    "pm4p0",
    "pm10p0",
    "ambient_temperature",
    "ambient_humidity",
    "voc_index",
    "nox_index",
];

/// One air-quality and climate reading from a device's environment sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentReading {
    /// PM1.0 mass concentration in µg/m³
    pub pm1p0: f64,
    /// PM2.5 mass concentration in µg/m³
    pub pm2p5: f64,
    /// PM4.0 mass concentration in µg/m³
    pub pm4p0: f64,
    /// PM10.0 mass concentration in µg/m³
    pub pm10p0: f64,
    /// Ambient temperature in °C
    pub ambient_temperature: f64,
    /// Relative humidity in %
    pub ambient_humidity: f64,
    /// VOC index (1-500)
    pub voc_index: f64,
    /// NOx index (1-500)
    pub nox_index: f64,
    /// Additional sensor channels
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<EnvironmentReading> for Value {
    fn from(reading: EnvironmentReading) -> Self {
        serde_json::to_value(reading).unwrap_or(Value::Null)
    }
}

/// A single named alternative with its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub confidence: Confidence,
}

impl Candidate {
    pub fn new(name: impl Into<String>, confidence: impl Into<Confidence>) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.into(),
        }
    }
}

/// Per-level candidate lists reported alongside the winning taxon.
///
/// Order is preserved exactly as given; the client enforces neither
/// cardinality nor confidence ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub family: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genus: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub species: Vec<Candidate>,
}

impl From<ClassificationData> for Value {
    fn from(data: ClassificationData) -> Self {
        serde_json::to_value(data).unwrap_or(Value::Null)
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub items: Vec<Value>,
    /// Cursor for the following page, absent on the last one
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Raw response of a create call.
///
/// Some endpoints return the created record directly and others wrap it as
/// `{"data": {...}}`. Both shapes are accepted as they come; `record()`
/// looks through the wrapper and `is_wrapped()` reports which shape the
/// server used.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse(Value);

impl ApiResponse {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// True when the server answered with a `{"data": {...}}` envelope.
    pub fn is_wrapped(&self) -> bool {
        matches!(self.0.get("data"), Some(Value::Object(_)))
    }

    /// The created record, whichever envelope carried it.
    pub fn record(&self) -> &Value {
        match self.0.get("data") {
            Some(data @ Value::Object(_)) => data,
            _ => &self.0,
        }
    }

    /// Looks a field up on the record, then on the outer object.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.record().get(key).or_else(|| self.0.get(key))
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}
