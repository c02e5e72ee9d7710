use serde_json::{Map, Value};
use tracing::debug;

use super::{parse_page, to_value};
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{Identifier, Page};
use crate::validation;

const PATH: &str = "devices";

/// Filters for listing devices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceFilter {
    pub device_id: Option<Identifier>,
    pub limit: Option<u32>,
    pub next_token: Option<String>,
}

impl DeviceFilter {
    pub fn device_id(mut self, device_id: impl Into<Identifier>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn next_token(mut self, next_token: impl Into<String>) -> Self {
        self.next_token = Some(next_token.into());
        self
    }

    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(device_id) = &self.device_id {
            query.push(("device_id", device_id.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(next_token) = &self.next_token {
            query.push(("next_token", next_token.clone()));
        }
        query
    }
}

/// Device registry: add, delete and list.
#[derive(Clone)]
pub struct DevicesClient {
    transport: Transport,
}

impl DevicesClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub async fn add(&self, device_id: impl Into<Identifier>) -> Result<Value> {
        let device_id = device_id.into();
        validation::required_identifier(&device_id, "device_id")?;

        let mut body = Map::new();
        body.insert("device_id".to_string(), to_value(&device_id)?);
        debug!("Adding device {}", device_id);
        self.transport.post(PATH, &body).await
    }

    pub async fn delete(&self, device_id: impl Into<Identifier>) -> Result<Value> {
        let device_id = device_id.into();
        validation::required_identifier(&device_id, "device_id")?;

        debug!("Deleting device {}", device_id);
        self.transport
            .delete(PATH, &[("device_id", device_id.to_string())])
            .await
    }

    pub async fn list(&self, filter: &DeviceFilter) -> Result<Page> {
        let response = self.transport.get(PATH, &filter.to_query()).await?;
        parse_page(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::Error;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client(url: String) -> DevicesClient {
        DevicesClient::new(Transport::new(&ClientConfig::new(url, "test_key")).unwrap())
    }

    #[test]
    fn test_filter_query() {
        assert!(DeviceFilter::default().to_query().is_empty());
        let filter = DeviceFilter::default()
            .device_id(42)
            .limit(25)
            .next_token("abc");
        assert_eq!(
            filter.to_query(),
            vec![
                ("device_id", "42".to_string()),
                ("limit", "25".to_string()),
                ("next_token", "abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_device_id_makes_no_call() {
        let mut server = Server::new();
        let mock = server.mock("POST", "/devices").expect(0).create();
        let delete = server
            .mock("DELETE", "/devices")
            .match_query(Matcher::Any)
            .expect(0)
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let devices = client(server.url());
            assert!(matches!(devices.add("").await, Err(Error::Validation(_))));
            assert!(matches!(devices.delete("").await, Err(Error::Validation(_))));
        });

        mock.assert();
        delete.assert();
    }

    #[test]
    fn test_add_list_delete() {
        let mut server = Server::new();
        let add = server
            .mock("POST", "/devices")
            .match_body(Matcher::Json(json!({"device_id": "pi-greenhouse-01"})))
            .with_status(200)
            .with_body(r#"{"statusCode": 200, "message": "Device added"}"#)
            .create();
        let list = server
            .mock("GET", "/devices")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("device_id".into(), "pi-greenhouse-01".into()),
                Matcher::UrlEncoded("limit".into(), "50".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"items": [{"device_id": "pi-greenhouse-01"}], "next_token": null}"#)
            .create();
        let delete = server
            .mock("DELETE", "/devices")
            .match_query(Matcher::UrlEncoded("device_id".into(), "pi-greenhouse-01".into()))
            .with_status(200)
            .with_body(r#"{"statusCode": 200, "message": "Device deleted"}"#)
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let devices = client(server.url());
            let added = devices.add("pi-greenhouse-01").await.unwrap();
            assert_eq!(added["message"], json!("Device added"));

            let page = devices
                .list(&DeviceFilter::default().device_id("pi-greenhouse-01").limit(50))
                .await
                .unwrap();
            assert_eq!(page.items[0]["device_id"], json!("pi-greenhouse-01"));
            assert!(page.next_token.is_none());

            devices.delete("pi-greenhouse-01").await.unwrap();
        });

        add.assert();
        list.assert();
        delete.assert();
    }
}
