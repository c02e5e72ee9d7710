//! Client configuration.
//!
//! A `ClientConfig` is built once (explicitly, from a TOML file, or from the
//! process environment) and handed to `SensingGardenClient::new`. Request
//! methods never read the environment themselves.

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

const DEFAULT_REGION: &str = "us-east-1";

/// Object stores reject multipart parts smaller than this, except the last.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `https://api.example.com/prod`
    pub base_url: String,
    /// Key sent in the `x-api-key` header on every call
    pub api_key: String,
    /// Whole-request timeout in seconds; unset keeps the HTTP stack default
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Credentials used to sign the video upload path
    #[serde(default)]
    pub aws: Option<AwsCredentials>,
    #[serde(default)]
    pub image_encoding: ImageEncoding,
    #[serde(default)]
    pub environment_field: EnvironmentField,
    #[serde(default)]
    pub video: VideoUploadConfig,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_secs: None,
            connect_timeout_secs: None,
            aws: None,
            image_encoding: ImageEncoding::default(),
            environment_field: EnvironmentField::default(),
            video: VideoUploadConfig::default(),
        }
    }

    /// Reads a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Reads `API_BASE_URL`, `SENSING_GARDEN_API_KEY` and the optional
    /// `AWS_*` credential variables.
    pub fn from_env() -> Result<Self> {
        let base_url = require_env("API_BASE_URL")?;
        let api_key = require_env("SENSING_GARDEN_API_KEY")?;
        let mut config = Self::new(base_url, api_key);

        if let (Ok(access_key_id), Ok(secret_access_key)) = (
            std::env::var("AWS_ACCESS_KEY_ID"),
            std::env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            let region =
                std::env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());
            let mut credentials = AwsCredentials::new(access_key_id, secret_access_key, region);
            credentials.session_token = std::env::var("AWS_SESSION_TOKEN").ok();
            config.aws = Some(credentials);
        }
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn with_aws(mut self, credentials: AwsCredentials) -> Self {
        self.aws = Some(credentials);
        self
    }

    pub fn with_image_encoding(mut self, encoding: ImageEncoding) -> Self {
        self.image_encoding = encoding;
        self
    }

    pub fn with_environment_field(mut self, field: EnvironmentField) -> Self {
        self.environment_field = field;
        self
    }

    pub fn with_video(mut self, video: VideoUploadConfig) -> Self {
        self.video = video;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    /// Rejects a configuration the client cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Configuration("base_url is not set".to_string()));
        }
        reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::Configuration(format!("invalid base_url '{}': {e}", self.base_url)))?;
        if self.api_key.trim().is_empty() {
            return Err(Error::Configuration("api_key is not set".to_string()));
        }
        if let Some(aws) = &self.aws {
            aws.validate()?;
        }
        if self.video.part_size == 0 {
            return Err(Error::Configuration("video.part_size must be positive".to_string()));
        }
        Ok(())
    }
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::Configuration(format!(
            "{name} environment variable is not set"
        ))),
    }
}

/// AWS-style credential set used for request signing.
#[derive(Clone, Deserialize)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl AwsCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.access_key_id.is_empty() || self.secret_access_key.is_empty() {
            return Err(Error::Configuration(
                "aws credentials need both access_key_id and secret_access_key".to_string(),
            ));
        }
        if self.region.is_empty() {
            return Err(Error::Configuration("aws region is not set".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// How image bytes travel with detection and classification records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    /// Base64 text under the `image` key of the JSON body
    #[default]
    Base64,
    /// `multipart/form-data` with a `payload` JSON part and an `image` part
    Multipart,
}

/// Key under which a classification's environment reading is sent.
///
/// Older servers read `data`; newer ones read `environment`. `Both` sends
/// the reading under each key while a deployment migrates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentField {
    #[default]
    Environment,
    Data,
    Both,
}

impl EnvironmentField {
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            EnvironmentField::Environment => &["environment"],
            EnvironmentField::Data => &["data"],
            EnvironmentField::Both => &["environment", "data"],
        }
    }
}

/// Size contract for video uploads; match it to the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VideoUploadConfig {
    /// Content at or above this size goes through the multipart protocol
    pub multipart_threshold: u64,
    /// Chunk size when the server does not dictate one
    pub part_size: u64,
}

impl Default for VideoUploadConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: MIN_PART_SIZE,
            part_size: MIN_PART_SIZE,
        }
    }
}
