use crate::config::VideoUploadConfig;
use crate::error::Result;
use crate::query::FetchParams;
use crate::transport::Transport;
use crate::types::Page;
use crate::upload::{NewVideo, UploadCoordinator, VideoUpload};

use super::{count, fetch_page};

const PATH: &str = "videos";

/// Video records: read side plus the upload path.
#[derive(Clone)]
pub struct VideosClient {
    transport: Transport,
    uploader: UploadCoordinator,
}

impl VideosClient {
    pub fn new(transport: Transport, config: VideoUploadConfig) -> Self {
        let uploader = UploadCoordinator::new(transport.clone(), config);
        Self {
            transport,
            uploader,
        }
    }

    /// Uploads a video, single-shot or in parts depending on its size.
    ///
    /// Needs AWS credentials in the client configuration.
    pub async fn upload_video(&self, video: NewVideo) -> Result<VideoUpload> {
        self.uploader.upload(video).await
    }

    pub async fn fetch(&self, params: &FetchParams) -> Result<Page> {
        fetch_page(&self.transport, PATH, params).await
    }

    pub async fn count(&self, params: &FetchParams) -> Result<u64> {
        count(&self.transport, PATH, params).await
    }
}
