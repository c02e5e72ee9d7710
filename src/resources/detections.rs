use serde_json::{Map, Value};
use tracing::debug;

use super::{count, fetch_page, to_value};
use crate::error::Result;
use crate::query::FetchParams;
use crate::transport::Transport;
use crate::types::{ApiResponse, Identifier, Page};
use crate::validation;

const PATH: &str = "detections";

/// An object detection to record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDetection {
    pub device_id: Identifier,
    pub model_id: Identifier,
    pub image_data: Vec<u8>,
    /// Forwarded verbatim as the record's ordering key
    pub timestamp: String,
    /// Must be an array of exactly four numbers when set
    pub bounding_box: Option<Value>,
}

impl NewDetection {
    pub fn new(
        device_id: impl Into<Identifier>,
        model_id: impl Into<Identifier>,
        image_data: impl Into<Vec<u8>>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            model_id: model_id.into(),
            image_data: image_data.into(),
            timestamp: timestamp.into(),
            bounding_box: None,
        }
    }

    pub fn bounding_box(mut self, bounding_box: impl Into<Value>) -> Self {
        self.bounding_box = Some(bounding_box.into());
        self
    }

    /// Validates and returns the JSON body and the image bytes.
    pub(crate) fn into_parts(self) -> Result<(Map<String, Value>, Vec<u8>)> {
        validation::required_identifier(&self.device_id, "device_id")?;
        validation::required_identifier(&self.model_id, "model_id")?;
        validation::non_empty_bytes(&self.image_data, "image_data")?;
        validation::required_string(&self.timestamp, "timestamp")?;
        let bounding_box = match self.bounding_box.filter(|v| !v.is_null()) {
            Some(bbox) => {
                validation::bounding_box_detection(&bbox)?;
                Some(bbox)
            }
            None => None,
        };

        let mut body = Map::new();
        body.insert("device_id".to_string(), to_value(&self.device_id)?);
        body.insert("model_id".to_string(), to_value(&self.model_id)?);
        body.insert("timestamp".to_string(), Value::String(self.timestamp));
        if let Some(bbox) = bounding_box {
            body.insert("bounding_box".to_string(), bbox);
        }
        Ok((body, self.image_data))
    }
}

#[derive(Clone)]
pub struct DetectionsClient {
    transport: Transport,
}

impl DetectionsClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub async fn add(&self, detection: NewDetection) -> Result<ApiResponse> {
        let (body, image) = detection.into_parts()?;
        debug!("Adding detection for device {}", body["device_id"]);
        let response = self.transport.post_with_image(PATH, body, &image).await?;
        Ok(ApiResponse::new(response))
    }

    pub async fn fetch(&self, params: &FetchParams) -> Result<Page> {
        fetch_page(&self.transport, PATH, params).await
    }

    pub async fn count(&self, params: &FetchParams) -> Result<u64> {
        count(&self.transport, PATH, params).await
    }
}
