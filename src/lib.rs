//! Client for the Sensing Garden API.
//!
//! Devices report detections, taxonomic classifications, environmental
//! readings and videos. Every payload is validated locally before anything
//! is sent; videos large enough to matter go straight to object storage in
//! parts.

mod client;
pub mod config;
mod error;
pub mod query;
pub mod resources;
pub mod signing;
mod transport;
pub mod types;
pub mod upload;
pub mod validation;

pub use client::SensingGardenClient;
pub use config::{AwsCredentials, ClientConfig, EnvironmentField, ImageEncoding, VideoUploadConfig};
pub use error::{Error, Result, ValidationError, ValidationKind};
pub use query::FetchParams;
pub use resources::{
    ClassificationsClient, DetectionsClient, DeviceFilter, DevicesClient, EnvironmentClient,
    ModelsClient, NewClassification, NewDetection, NewEnvironmentReading, NewModel, VideosClient,
};
pub use transport::Transport;
pub use types::{
    ApiResponse, Candidate, ClassificationData, Confidence, EnvironmentReading, Identifier,
    Location, Page,
};
pub use upload::{NewVideo, UploadPhase, VideoSource, VideoUpload};

#[cfg(test)]
mod tests;
