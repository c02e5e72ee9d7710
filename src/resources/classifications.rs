use serde_json::{Map, Value};
use tracing::debug;

use super::{count, fetch_page, insert_present, to_value};
use crate::config::EnvironmentField;
use crate::error::Result;
use crate::query::FetchParams;
use crate::transport::Transport;
use crate::types::{ApiResponse, Confidence, Identifier, Page};
use crate::validation;

const PATH: &str = "classifications";

/// A taxonomic classification to record.
///
/// `bounding_box` and `classification_data` are forwarded exactly as given;
/// `location` and `environment` are checked like everywhere else.
#[derive(Debug, Clone, PartialEq)]
pub struct NewClassification {
    pub device_id: Identifier,
    pub model_id: Identifier,
    pub image_data: Vec<u8>,
    pub family: String,
    pub genus: String,
    pub species: String,
    pub family_confidence: Confidence,
    pub genus_confidence: Confidence,
    pub species_confidence: Confidence,
    pub timestamp: String,
    /// Any representation; `None` or null omits it
    pub bounding_box: Option<Value>,
    pub track_id: Option<String>,
    pub metadata: Option<Value>,
    /// `{family|genus|species: [{name, confidence}, ...]}`
    pub classification_data: Option<Value>,
    pub location: Option<Value>,
    pub environment: Option<Value>,
}

impl NewClassification {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device_id: impl Into<Identifier>,
        model_id: impl Into<Identifier>,
        image_data: impl Into<Vec<u8>>,
        family: impl Into<String>,
        genus: impl Into<String>,
        species: impl Into<String>,
        family_confidence: impl Into<Confidence>,
        genus_confidence: impl Into<Confidence>,
        species_confidence: impl Into<Confidence>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            model_id: model_id.into(),
            image_data: image_data.into(),
            family: family.into(),
            genus: genus.into(),
            species: species.into(),
            family_confidence: family_confidence.into(),
            genus_confidence: genus_confidence.into(),
            species_confidence: species_confidence.into(),
            timestamp: timestamp.into(),
            bounding_box: None,
            track_id: None,
            metadata: None,
            classification_data: None,
            location: None,
            environment: None,
        }
    }

    pub fn bounding_box(mut self, bounding_box: impl Into<Value>) -> Self {
        self.bounding_box = Some(bounding_box.into());
        self
    }

    pub fn track_id(mut self, track_id: impl Into<String>) -> Self {
        self.track_id = Some(track_id.into());
        self
    }

    pub fn metadata(mut self, metadata: impl Into<Value>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn classification_data(mut self, data: impl Into<Value>) -> Self {
        self.classification_data = Some(data.into());
        self
    }

    pub fn location(mut self, location: impl Into<Value>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<Value>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub(crate) fn into_parts(
        self,
        environment_field: EnvironmentField,
    ) -> Result<(Map<String, Value>, Vec<u8>)> {
        validation::required_identifier(&self.device_id, "device_id")?;
        validation::required_identifier(&self.model_id, "model_id")?;
        validation::non_empty_bytes(&self.image_data, "image_data")?;
        validation::required_string(&self.timestamp, "timestamp")?;
        validation::required_string(&self.family, "family")?;
        validation::required_string(&self.genus, "genus")?;
        validation::required_string(&self.species, "species")?;

        let location = self.location.filter(|v| !v.is_null());
        if let Some(location) = &location {
            validation::location(location)?;
        }
        let environment = self.environment.filter(|v| !v.is_null());
        if let Some(environment) = &environment {
            validation::environment_data(environment, "environment")?;
        }
        let bounding_box = validation::bounding_box_classification(self.bounding_box);

        let mut body = Map::new();
        body.insert("device_id".to_string(), to_value(&self.device_id)?);
        body.insert("model_id".to_string(), to_value(&self.model_id)?);
        body.insert("family".to_string(), Value::String(self.family));
        body.insert("genus".to_string(), Value::String(self.genus));
        body.insert("species".to_string(), Value::String(self.species));
        body.insert("family_confidence".to_string(), to_value(&self.family_confidence)?);
        body.insert("genus_confidence".to_string(), to_value(&self.genus_confidence)?);
        body.insert("species_confidence".to_string(), to_value(&self.species_confidence)?);
        body.insert("timestamp".to_string(), Value::String(self.timestamp));

        insert_present(&mut body, "bounding_box", bounding_box);
        insert_present(&mut body, "track_id", self.track_id.map(Value::String));
        insert_present(&mut body, "metadata", self.metadata);
        insert_present(&mut body, "classification_data", self.classification_data);
        insert_present(&mut body, "location", location);
        if let Some(environment) = environment {
            for key in environment_field.keys() {
                body.insert((*key).to_string(), environment.clone());
            }
        }
        Ok((body, self.image_data))
    }
}

#[derive(Clone)]
pub struct ClassificationsClient {
    transport: Transport,
    environment_field: EnvironmentField,
}

impl ClassificationsClient {
    pub fn new(transport: Transport, environment_field: EnvironmentField) -> Self {
        Self {
            transport,
            environment_field,
        }
    }

    pub async fn add(&self, classification: NewClassification) -> Result<ApiResponse> {
        let (body, image) = classification.into_parts(self.environment_field)?;
        debug!(
            "Adding classification for device {} ({} keys)",
            body["device_id"],
            body.len()
        );
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
