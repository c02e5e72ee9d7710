use serde_json::{Map, Value};
use tracing::debug;

use super::{count, fetch_page, to_value};
use crate::error::Result;
use crate::query::FetchParams;
use crate::transport::Transport;
use crate::types::{ApiResponse, Identifier, Page};
use crate::validation;

const PATH: &str = "models";

/// A model registration.
#[derive(Debug, Clone, PartialEq)]
pub struct NewModel {
    pub model_id: Identifier,
    pub name: String,
    pub version: String,
    /// Sent as an empty string when not given
    pub description: String,
}

impl NewModel {
    pub fn new(
        model_id: impl Into<Identifier>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub(crate) fn into_body(self) -> Result<Map<String, Value>> {
        validation::required_identifier(&self.model_id, "model_id")?;
        validation::required_string(&self.name, "name")?;
        validation::required_string(&self.version, "version")?;

        let mut body = Map::new();
        body.insert("model_id".to_string(), to_value(&self.model_id)?);
        body.insert("name".to_string(), Value::String(self.name));
        body.insert("version".to_string(), Value::String(self.version));
        body.insert("description".to_string(), Value::String(self.description));
        Ok(body)
    }
}

#[derive(Clone)]
pub struct ModelsClient {
    transport: Transport,
}

impl ModelsClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub async fn create(&self, model: NewModel) -> Result<ApiResponse> {
        let body = model.into_body()?;
        debug!("Creating model {}", body["model_id"]);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::Error;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn test_description_defaults_to_empty() {
        let body = NewModel::new("m1", "Example Model", "1.0.0").into_body().unwrap();
        assert_eq!(
            Value::Object(body),
            json!({"model_id": "m1", "name": "Example Model", "version": "1.0.0", "description": ""})
        );
    }

    #[test]
    fn test_required_fields() {
        assert!(NewModel::new("", "n", "v").into_body().is_err());
        assert!(NewModel::new("m1", "", "v").into_body().is_err());
        assert!(NewModel::new("m1", "n", "").into_body().is_err());
    }

    #[test]
    fn test_create_and_count() {
        let mut server = Server::new();
        let create = server
            .mock("POST", "/models")
            .match_body(Matcher::Json(json!({
                "model_id": "m1", "name": "Example", "version": "1.0.0",
                "description": "A model"
            })))
            .with_status(200)
            .with_body(r#"{"message": "Model created", "data": {"model_id": "m1"}}"#)
            .create();
        let count_mock = server
            .mock("GET", "/models/count")
            .with_status(200)
            .with_body(r#"{"count": 12}"#)
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let models = ModelsClient::new(
                Transport::new(&ClientConfig::new(server.url(), "test_key")).unwrap(),
            );
            let response = models
                .create(NewModel::new("m1", "Example", "1.0.0").description("A model"))
                .await
                .unwrap();
            assert!(response.is_wrapped());
            assert_eq!(response.field("model_id"), Some(&json!("m1")));
            assert_eq!(models.count(&FetchParams::new()).await.unwrap(), 12);

            let err = models.create(NewModel::new("m1", "", "1.0.0")).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        });

        create.assert();
        count_mock.assert();
    }
}
