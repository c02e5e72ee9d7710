//! Resource clients.
//!
//! One client per record type. Each turns a typed request into a JSON body
//! holding only the fields that are set, runs that resource's validators
//! first, and then hands the body to the shared `Transport`.

pub mod classifications;
pub mod detections;
pub mod devices;
pub mod environment;
pub mod models;
pub mod videos;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::query::FetchParams;
use crate::transport::Transport;
use crate::types::Page;

pub use classifications::{ClassificationsClient, NewClassification};
pub use detections::{DetectionsClient, NewDetection};
pub use devices::{DeviceFilter, DevicesClient};
pub use environment::{EnvironmentClient, NewEnvironmentReading};
pub use models::{ModelsClient, NewModel};
pub use videos::VideosClient;

pub(crate) async fn fetch_page(
    transport: &Transport,
    path: &str,
    params: &FetchParams,
) -> Result<Page> {
    let response = transport.get(path, &params.to_query()).await?;
    parse_page(response)
}

pub(crate) fn parse_page(response: Value) -> Result<Page> {
    if response.is_null() {
        return Ok(Page::default());
    }
    Ok(serde_json::from_value(response)?)
}

pub(crate) async fn count(transport: &Transport, path: &str, params: &FetchParams) -> Result<u64> {
    let response = transport
        .get(&format!("{path}/count"), &params.to_count_query())
        .await?;
    parse_count(&response)
}

fn parse_count(response: &Value) -> Result<u64> {
    response
        .get("count")
        .or_else(|| response.get("data").and_then(|d| d.get("count")))
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::UnexpectedResponse(format!("no count in response: {response}")))
}

/// Inserts `value` under `key` only when it is set and not JSON null.
pub(crate) fn insert_present(body: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value.filter(|v| !v.is_null()) {
        body.insert(key.to_string(), value);
    }
}

pub(crate) fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
