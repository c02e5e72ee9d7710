use serde_json::{Map, Value};
use tracing::debug;

use super::{count, fetch_page, insert_present, to_value};
use crate::error::Result;
use crate::query::FetchParams;
use crate::transport::Transport;
use crate::types::{ApiResponse, Identifier, Page};
use crate::validation;

const PATH: &str = "environment";

/// An environmental sensor reading to record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEnvironmentReading {
    pub device_id: Identifier,
    /// Must hold every key in `ENVIRONMENT_KEYS`
    pub data: Value,
    pub timestamp: String,
    pub location: Option<Value>,
}

impl NewEnvironmentReading {
    pub fn new(
        device_id: impl Into<Identifier>,
        data: impl Into<Value>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            data: data.into(),
            timestamp: timestamp.into(),
            location: None,
        }
    }

    pub fn location(mut self, location: impl Into<Value>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub(crate) fn into_body(self) -> Result<Map<String, Value>> {
        validation::required_identifier(&self.device_id, "device_id")?;
        validation::environment_data(&self.data, "data")?;
        validation::required_string(&self.timestamp, "timestamp")?;
        let location = self.location.filter(|v| !v.is_null());
        if let Some(location) = &location {
            validation::location(location)?;
        }

        let mut body = Map::new();
        body.insert("device_id".to_string(), to_value(&self.device_id)?);
        body.insert("timestamp".to_string(), Value::String(self.timestamp));
        body.insert("data".to_string(), self.data);
        insert_present(&mut body, "location", location);
        Ok(body)
    }
}

#[derive(Clone)]
pub struct EnvironmentClient {
    transport: Transport,
}

impl EnvironmentClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub async fn add(&self, reading: NewEnvironmentReading) -> Result<ApiResponse> {
        let body = reading.into_body()?;
        debug!("Adding environment reading for device {}", body["device_id"]);
        let response = self.transport.post(PATH, &body).await?;
        Ok(ApiResponse::new(response))
    }

    pub async fn fetch(&self, params: &FetchParams) -> Result<Page> {
        fetch_page(&self.transport, PATH, params).await
    }

    pub async fn count(&self, params: &FetchParams) -> Result<u64> {
        count(&self.transport, PATH, params).await
    }
}
