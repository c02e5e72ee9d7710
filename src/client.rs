use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::resources::{
    ClassificationsClient, DetectionsClient, DeviceFilter, DevicesClient, EnvironmentClient,
    ModelsClient, VideosClient,
};
use crate::transport::Transport;
use crate::types::{Identifier, Page};

/// Entry point: one configured transport shared by every resource client.
///
/// ```no_run
/// use sensing_garden_client::{ClientConfig, NewModel, SensingGardenClient};
///
/// # async fn run() -> sensing_garden_client::Result<()> {
/// let client = SensingGardenClient::new(ClientConfig::from_env()?)?;
/// client
///     .models()
///     .create(NewModel::new("yolo-v8", "YOLO v8", "1.0.0"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SensingGardenClient {
    models: ModelsClient,
    detections: DetectionsClient,
    classifications: ClassificationsClient,
    environment: EnvironmentClient,
    videos: VideosClient,
    devices: DevicesClient,
}

impl SensingGardenClient {
    /// Validates `config` and builds every resource client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Transport::new(&config)?;
        Ok(Self {
            models: ModelsClient::new(transport.clone()),
            detections: DetectionsClient::new(transport.clone()),
            classifications: ClassificationsClient::new(
                transport.clone(),
                config.environment_field,
            ),
            environment: EnvironmentClient::new(transport.clone()),
            videos: VideosClient::new(transport.clone(), config.video),
            devices: DevicesClient::new(transport),
        })
    }

    pub fn models(&self) -> &ModelsClient {
        &self.models
    }

    pub fn detections(&self) -> &DetectionsClient {
        &self.detections
    }

    pub fn classifications(&self) -> &ClassificationsClient {
        &self.classifications
    }

    pub fn environment(&self) -> &EnvironmentClient {
        &self.environment
    }

    pub fn videos(&self) -> &VideosClient {
        &self.videos
    }

    pub fn devices(&self) -> &DevicesClient {
        &self.devices
    }

    pub async fn add_device(&self, device_id: impl Into<Identifier>) -> Result<Value> {
        self.devices.add(device_id).await
    }

    pub async fn delete_device(&self, device_id: impl Into<Identifier>) -> Result<Value> {
        self.devices.delete(device_id).await
    }

    /// One page of devices and the cursor for the next.
    pub async fn get_devices(&self, filter: &DeviceFilter) -> Result<(Vec<Value>, Option<String>)> {
        let Page { items, next_token } = self.devices.list(filter).await?;
        Ok((items, next_token))
    }
}
