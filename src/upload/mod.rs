//! Video upload coordinator.
//!
//! Small videos go up in one signed POST with the bytes inlined as base64.
//! Anything at or above the configured threshold uses the multipart
//! protocol: the API opens a session and hands out one storage URL per
//! part, each part is PUT straight to storage, and the API is asked to
//! stitch the parts together. Parts are sent one after another, so every
//! ETag is in hand before the session is completed.
//!
//! The caller's timestamp is sent verbatim on every call; it is the
//! record's ordering key.

mod source;

use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::config::VideoUploadConfig;
use crate::error::{Error, Result};
use crate::resources::{insert_present, to_value};
use crate::transport::Transport;
use crate::types::{ApiResponse, Identifier};
use crate::validation;

pub use source::VideoSource;
use source::{ensure_non_empty, extension_for};

const UPLOAD_PATH: &str = "videos/upload";
const INIT_PATH: &str = "videos/upload/init";
const COMPLETE_PATH: &str = "videos/upload/complete";
const ABORT_PATH: &str = "videos/upload/abort";

/// Lifecycle of one upload.
///
/// `Preparing -> Initiated -> UploadingParts -> Completing -> Done` for
/// multipart uploads, `Preparing -> Completing -> Done` for single-shot
/// ones. `Failed` is reachable from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Preparing,
    Initiated,
    UploadingParts,
    Completing,
    Done,
    Failed,
}

impl UploadPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadPhase::Done | UploadPhase::Failed)
    }

    pub fn can_transition_to(self, next: UploadPhase) -> bool {
        use UploadPhase::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Preparing, Initiated)
            | (Preparing, Completing)
            | (Initiated, UploadingParts)
            | (UploadingParts, Completing)
            | (Completing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = match self {
            UploadPhase::Preparing => "preparing the upload",
            UploadPhase::Initiated => "initiating the upload session",
            UploadPhase::UploadingParts => "uploading parts",
            UploadPhase::Completing => "completing the upload",
            UploadPhase::Done => "done",
            UploadPhase::Failed => "failed",
        };
        f.write_str(phrase)
    }
}

/// A video to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVideo {
    pub device_id: Identifier,
    /// Stored verbatim as the record's timestamp
    pub timestamp: String,
    pub source: VideoSource,
    pub content_type: Option<String>,
    pub metadata: Option<Value>,
}

impl NewVideo {
    pub fn new(
        device_id: impl Into<Identifier>,
        timestamp: impl Into<String>,
        source: impl Into<VideoSource>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp: timestamp.into(),
            source: source.into(),
            content_type: None,
            metadata: None,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn metadata(mut self, metadata: impl Into<Value>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

/// Outcome of a finished upload.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoUpload {
    /// Object key, as reported by the server when it reports one
    pub video_key: String,
    pub timestamp: String,
    pub metadata: Option<Value>,
    /// Raw response of the call that finished the upload
    pub response: ApiResponse,
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    upload_id: String,
    #[serde(default)]
    video_key: Option<String>,
    #[serde(default)]
    part_size: Option<u64>,
    #[serde(default)]
    parts: Vec<PartTarget>,
}

#[derive(Debug, Deserialize)]
struct PartTarget {
    part_number: u32,
    url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct CompletedPart {
    part_number: u32,
    etag: String,
}

/// State that lives for one multipart upload.
#[derive(Debug)]
struct UploadSession {
    phase: UploadPhase,
    upload_id: Option<String>,
    video_key: String,
    parts: Vec<CompletedPart>,
}

impl UploadSession {
    fn new(video_key: String) -> Self {
        Self {
            phase: UploadPhase::Preparing,
            upload_id: None,
            video_key,
            parts: Vec::new(),
        }
    }

    fn advance(&mut self, next: UploadPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(Error::UnexpectedResponse(format!(
                "illegal upload transition from {:?} to {:?}",
                self.phase, next
            )));
        }
        debug!("Upload {}: {:?} -> {:?}", self.video_key, self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Marks the session failed and wraps `source` with the phase it failed in.
    fn fail(&mut self, failed_in: UploadPhase, source: Error) -> Error {
        error!("Upload {} failed while {}: {}", self.video_key, failed_in, source);
        self.phase = UploadPhase::Failed;
        Error::upload(failed_in, source)
    }
}

/// Drives a video through single-shot or multipart upload.
#[derive(Clone)]
pub struct UploadCoordinator {
    transport: Transport,
    config: VideoUploadConfig,
}

impl UploadCoordinator {
    pub fn new(transport: Transport, config: VideoUploadConfig) -> Self {
        Self { transport, config }
    }

    pub async fn upload(&self, video: NewVideo) -> Result<VideoUpload> {
        if self.transport.signer().is_none() {
            return Err(Error::Configuration(
                "aws credentials are required to upload videos".to_string(),
            ));
        }
        validation::required_identifier(&video.device_id, "device_id")?;
        validation::required_string(&video.timestamp, "timestamp")?;

        let NewVideo {
            device_id,
            timestamp,
            source,
            content_type,
            metadata,
        } = video;

        let size = source.len().await?;
        ensure_non_empty(size)?;
        let content_type = source.content_type(content_type.as_deref());
        let video_key = format!(
            "videos/{}/{}.{}",
            device_id,
            timestamp,
            extension_for(&content_type)
        );
        let request = PreparedVideo {
            device_id,
            timestamp,
            content_type,
            metadata,
            size,
        };

        let mut session = UploadSession::new(video_key);
        if size < self.config.multipart_threshold {
            debug!("Uploading {} bytes to {} in one request", size, session.video_key);
            self.upload_single(&mut session, &request, source).await
        } else {
            debug!("Uploading {} bytes to {} in parts", size, session.video_key);
            self.upload_multipart(&mut session, &request, source).await
        }
    }

    async fn upload_single(
        &self,
        session: &mut UploadSession,
        request: &PreparedVideo,
        source: VideoSource,
    ) -> Result<VideoUpload> {
        session.advance(UploadPhase::Completing)?;
        let bytes = match source.read_all().await {
            Ok(bytes) => bytes,
            Err(e) => return Err(session.fail(UploadPhase::Completing, e)),
        };

        let mut body = request.base_body(&session.video_key)?;
        body.insert(
            "video".to_string(),
            Value::String(base64::engine::general_purpose::STANDARD.encode(&bytes)),
        );
        let response = match self.transport.post_signed(UPLOAD_PATH, &body).await {
            Ok(response) => ApiResponse::new(response),
            Err(e) => return Err(session.fail(UploadPhase::Completing, e)),
        };

        session.advance(UploadPhase::Done)?;
        Ok(request.finish(&session.video_key, response))
    }

    async fn upload_multipart(
        &self,
        session: &mut UploadSession,
        request: &PreparedVideo,
        source: VideoSource,
    ) -> Result<VideoUpload> {
        let init = match self.initiate(session, request).await {
            Ok(init) => init,
            Err(e) => return Err(session.fail(UploadPhase::Initiated, e)),
        };
        session.advance(UploadPhase::Initiated)?;

        let part_size = init
            .part_size
            .filter(|size| *size > 0)
            .unwrap_or(self.config.part_size);
        session.advance(UploadPhase::UploadingParts)?;
        if let Err(e) = self.upload_parts(session, init.parts, source, part_size, request.size).await {
            let err = session.fail(UploadPhase::UploadingParts, e);
            self.abort(session).await;
            return Err(err);
        }

        session.advance(UploadPhase::Completing)?;
        let mut body = request.base_body(&session.video_key)?;
        body.insert(
            "upload_id".to_string(),
            Value::String(session.upload_id.clone().unwrap_or_default()),
        );
        body.insert("parts".to_string(), to_value(&session.parts)?);
        let response = match self.transport.post_signed(COMPLETE_PATH, &body).await {
            Ok(response) => ApiResponse::new(response),
            Err(e) => return Err(session.fail(UploadPhase::Completing, e)),
        };

        session.advance(UploadPhase::Done)?;
        Ok(request.finish(&session.video_key, response))
    }

    async fn initiate(
        &self,
        session: &mut UploadSession,
        request: &PreparedVideo,
    ) -> Result<InitResponse> {
        let mut body = request.base_body(&session.video_key)?;
        body.insert("file_size".to_string(), Value::from(request.size));
        body.insert("part_size".to_string(), Value::from(self.config.part_size));

        let response = ApiResponse::new(self.transport.post_signed(INIT_PATH, &body).await?);
        let init: InitResponse = serde_json::from_value(response.record().clone())?;
        if init.parts.is_empty() {
            return Err(Error::UnexpectedResponse(
                "upload session returned no part urls".to_string(),
            ));
        }

        session.upload_id = Some(init.upload_id.clone());
        if let Some(key) = init.video_key.as_ref().filter(|k| !k.is_empty()) {
            session.video_key = key.clone();
        }
        Ok(init)
    }

    async fn upload_parts(
        &self,
        session: &mut UploadSession,
        mut targets: Vec<PartTarget>,
        source: VideoSource,
        part_size: u64,
        size: u64,
    ) -> Result<()> {
        let expected = size.div_ceil(part_size);
        if targets.len() as u64 != expected {
            return Err(Error::UnexpectedResponse(format!(
                "upload session returned {} part urls for {} parts",
                targets.len(),
                expected
            )));
        }
        targets.sort_by_key(|t| t.part_number);

        let mut chunks = source.chunks(part_size).await?;
        for target in targets {
            let chunk = chunks.next_chunk().await?.ok_or_else(|| {
                Error::UnexpectedResponse(format!(
                    "video ended before part {}",
                    target.part_number
                ))
            })?;
            debug!("Uploading part {} ({} bytes)", target.part_number, chunk.len());
            let etag = self.transport.put_part(&target.url, chunk).await?;
            session.parts.push(CompletedPart {
                part_number: target.part_number,
                etag,
            });
        }
        Ok(())
    }

    /// Best effort; the original failure is what the caller sees.
    async fn abort(&self, session: &UploadSession) {
        let Some(upload_id) = &session.upload_id else {
            return;
        };
        let mut body = Map::new();
        body.insert("upload_id".to_string(), Value::String(upload_id.clone()));
        body.insert("video_key".to_string(), Value::String(session.video_key.clone()));
        if let Err(e) = self.transport.post_signed(ABORT_PATH, &body).await {
            warn!("Failed to abort upload {}: {}", upload_id, e);
        }
    }
}

/// Everything resolved during preparation.
struct PreparedVideo {
    device_id: Identifier,
    timestamp: String,
    content_type: String,
    metadata: Option<Value>,
    size: u64,
}

impl PreparedVideo {
    fn base_body(&self, video_key: &str) -> Result<Map<String, Value>> {
        let mut body = Map::new();
        body.insert("device_id".to_string(), to_value(&self.device_id)?);
        body.insert("timestamp".to_string(), Value::String(self.timestamp.clone()));
        body.insert("video_key".to_string(), Value::String(video_key.to_string()));
        body.insert("content_type".to_string(), Value::String(self.content_type.clone()));
        insert_present(&mut body, "metadata", self.metadata.clone());
        Ok(body)
    }

    fn finish(&self, video_key: &str, response: ApiResponse) -> VideoUpload {
        let video_key = response
            .field("video_key")
            .or_else(|| response.field("id"))
            .and_then(Value::as_str)
            .unwrap_or(video_key)
            .to_string();
        VideoUpload {
            video_key,
            timestamp: self.timestamp.clone(),
            metadata: self.metadata.clone(),
            response,
        }
    }
}
