//! HTTP transport shared by every resource client.
//!
//! Attaches the API key to each call, encodes JSON bodies (and images, per
//! the configured `ImageEncoding`), and turns any status >= 400 into
//! `Error::Transport` carrying the raw body. Nothing is retried.

use base64::Engine;
use jiff::Timestamp;
use reqwest::header::{HeaderMap, HeaderValue, ETAG};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::config::{ClientConfig, ImageEncoding};
use crate::error::{Error, Result};
use crate::signing::{self, RequestSigner};

const API_KEY_HEADER: &str = "x-api-key";
pub(crate) const IMAGE_FIELD: &str = "image";

#[derive(Clone)]
pub struct Transport {
    http: Client,
    storage: Client,
    base_url: String,
    image_encoding: ImageEncoding,
    signer: Option<RequestSigner>,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(&config.api_key)?;
        api_key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, api_key);

        let http = client_builder(config).default_headers(headers).build()?;
        let storage = client_builder(config).build()?;

        Ok(Self {
            http,
            storage,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            image_encoding: config.image_encoding,
            signer: config.aws.clone().map(RequestSigner::new),
        })
    }

    pub fn signer(&self) -> Option<&RequestSigner> {
        self.signer.as_ref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        debug!("GET {} {:?}", url, query);
        self.execute(self.http.get(url).query(query)).await
    }

    pub async fn post(&self, path: &str, body: &Map<String, Value>) -> Result<Value> {
        let url = self.url(path);
        debug!("POST {}", url);
        self.execute(self.http.post(url).json(body)).await
    }

    pub async fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        debug!("DELETE {} {:?}", url, query);
        self.execute(self.http.delete(url).query(query)).await
    }

    /// POSTs a record that carries an image, encoded as configured.
    pub async fn post_with_image(
        &self,
        path: &str,
        mut body: Map<String, Value>,
        image: &[u8],
    ) -> Result<Value> {
        let url = self.url(path);
        match self.image_encoding {
            ImageEncoding::Base64 => {
                debug!("POST {} with {} byte image as base64", url, image.len());
                body.insert(
                    IMAGE_FIELD.to_string(),
                    Value::String(base64::engine::general_purpose::STANDARD.encode(image)),
                );
                self.execute(self.http.post(url).json(&body)).await
            }
            ImageEncoding::Multipart => {
                debug!("POST {} with {} byte image as multipart", url, image.len());
                let payload = Part::text(serde_json::to_string(&body)?)
                    .mime_str("application/json")?;
                let image = Part::bytes(image.to_vec())
                    .file_name("image")
                    .mime_str("application/octet-stream")?;
                let form = Form::new().part("payload", payload).part(IMAGE_FIELD, image);
                self.execute(self.http.post(url).multipart(form)).await
            }
        }
    }

    /// POSTs JSON signed with the configured credentials.
    pub async fn post_signed(&self, path: &str, body: &Map<String, Value>) -> Result<Value> {
        let signer = self.require_signer()?;
        let url = Url::parse(&self.url(path))
            .map_err(|e| Error::Configuration(format!("invalid url for {path}: {e}")))?;
        let payload = serde_json::to_vec(body)?;
        let headers = signer.sign("POST", &url, &payload, signing::API_SERVICE, Timestamp::now())?;

        debug!("POST {} (signed)", url);
        let mut request = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        self.execute(request).await
    }

    /// PUTs one chunk to a storage target and returns its ETag.
    ///
    /// The API key is never sent to storage.
    pub async fn put_part(&self, target: &str, chunk: Vec<u8>) -> Result<String> {
        let url = Url::parse(target)
            .map_err(|e| Error::UnexpectedResponse(format!("invalid part url '{target}': {e}")))?;

        let mut request = self.storage.request(Method::PUT, url.clone());
        if !signing::is_presigned(&url) {
            let headers = self.require_signer()?.sign(
                "PUT",
                &url,
                &chunk,
                signing::STORAGE_SERVICE,
                Timestamp::now(),
            )?;
            for (name, value) in headers {
                request = request.header(name, value);
            }
        }

        debug!("PUT {} ({} bytes)", url, chunk.len());
        let response = request.body(chunk).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Part upload failed with {}: {}", status, body);
            return Err(Error::Transport {
                status: status.as_u16(),
                body,
            });
        }

        response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::UnexpectedResponse("part upload returned no ETag".to_string()))
    }

    fn require_signer(&self) -> Result<&RequestSigner> {
        self.signer.as_ref().ok_or_else(|| {
            Error::Configuration(
                "aws credentials are required for the video upload path".to_string(),
            )
        })
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        debug!("Response status: {}", status);

        let text = response.text().await?;
        if !status.is_success() {
            error!("Request failed: {}", text);
            return Err(Error::Transport {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn client_builder(config: &ClientConfig) -> reqwest::ClientBuilder {
    let mut builder = Client::builder();
    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }
    if let Some(timeout) = config.connect_timeout() {
        builder = builder.connect_timeout(timeout);
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tracing_test::traced_test;

    fn transport(url: String) -> Transport {
        Transport::new(&ClientConfig::new(url, "test_key")).unwrap()
    }

    #[test]
    #[traced_test]
    fn test_api_key_and_json_body() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/models")
            .match_header("x-api-key", "test_key")
            .match_body(Matcher::Json(json!({"model_id": "m1"})))
            .with_status(200)
            .with_body(r#"{"message": "ok"}"#)
            .expect(1)
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let transport = transport(format!("{}/", server.url()));
            let mut body = Map::new();
            body.insert("model_id".to_string(), json!("m1"));
            let response = transport.post("models", &body).await.unwrap();
            assert_eq!(response, json!({"message": "ok"}));
        });

        mock.assert();
    }

    #[test]
    fn test_error_status_carries_body() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/detections")
            .match_query(Matcher::UrlEncoded("limit".into(), "5".into()))
            .with_status(400)
            .with_body("Invalid data")
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let result = transport(server.url())
                .get("detections", &[("limit", "5".to_string())])
                .await;
            match result {
                Err(Error::Transport { status, body }) => {
                    assert_eq!(status, 400);
                    assert_eq!(body, "Invalid data");
                }
                other => panic!("Expected Transport error, got {other:?}"),
            }
        });

        mock.assert();
    }

    #[test]
    fn test_image_as_base64_field() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/detections")
            .match_body(Matcher::PartialJson(json!({"device_id": "d1", "image": "AQI="})))
            .with_status(200)
            .with_body("{}")
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut body = Map::new();
            body.insert("device_id".to_string(), json!("d1"));
            transport(server.url())
                .post_with_image("detections", body, b"\x01\x02")
                .await
                .unwrap();
        });

        mock.assert();
    }

    #[test]
    fn test_image_as_multipart() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/classifications")
            .match_header(
                "content-type",
                Matcher::Regex("multipart/form-data.*".to_string()),
            )
            .match_body(Matcher::Regex(r#"name="payload""#.to_string()))
            .with_status(200)
            .with_body("{}")
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let config = ClientConfig::new(server.url(), "test_key")
                .with_image_encoding(ImageEncoding::Multipart);
            let transport = Transport::new(&config).unwrap();
            transport
                .post_with_image("classifications", Map::new(), b"\xff\xd8")
                .await
                .unwrap();
        });

        mock.assert();
    }

    #[test]
    fn test_empty_body_is_null() {
        let mut server = Server::new();
        let mock = server.mock("DELETE", "/devices").match_query(Matcher::Any).with_status(204).create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let response = transport(server.url())
                .delete("devices", &[("device_id", "d1".to_string())])
                .await
                .unwrap();
            assert_eq!(response, Value::Null);
        });

        mock.assert();
    }

    #[test]
    fn test_signed_post_requires_credentials() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let result = transport("http://127.0.0.1:9".to_string())
                .post_signed("videos/upload", &Map::new())
                .await;
            assert!(matches!(result, Err(Error::Configuration(_))));
        });
    }

    #[test]
    fn test_part_upload_returns_etag() {
        let mut server = Server::new();
        let mock = server
            .mock("PUT", "/storage/part")
            .match_query(Matcher::Any)
            .match_header("authorization", Matcher::Missing)
            .match_header("x-api-key", Matcher::Missing)
            .match_body("chunk")
            .with_status(200)
            .with_header("ETag", "\"etag-1\"")
            .create();

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let target = format!("{}/storage/part?partNumber=1&X-Amz-Signature=abc", server.url());
            let etag = transport(server.url())
                .put_part(&target, b"chunk".to_vec())
                .await
                .unwrap();
            assert_eq!(etag, "\"etag-1\"");
        });

        mock.assert();
    }
}
