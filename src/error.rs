//! Error types for the Sensing Garden client.
//!
//! This module defines every error a client call can return. Validation
//! failures are raised locally before any request is sent; everything else
//! wraps a failure reported by the API, the storage backend or the
//! underlying HTTP stack.
//!
//! The main error type is `Error`, which encompasses all possible error
//! conditions that can occur within the library.

use std::fmt;
use thiserror::Error;

use crate::upload::UploadPhase;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Represents all possible errors that can occur in the Sensing Garden client.
#[derive(Error, Debug)]
pub enum Error {
    /// A payload was rejected before any network call was made.
    ///
    /// This error occurs when:
    /// - A detection bounding box is not an array of exactly 4 numbers
    /// - A location lacks `lat` or `long`
    /// - An environment reading lacks one of the required keys
    /// - Image or video content is empty
    /// - A mandatory identifier or string is empty
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The API answered with a non-2xx status.
    ///
    /// Carries the status code and the raw response body so callers can
    /// inspect whatever the server reported.
    #[error("Server error {status}: {body}")]
    Transport { status: u16, body: String },

    /// A video upload failed in the given phase.
    ///
    /// The upload never reports success unless the finalize call succeeded.
    #[error("Video upload failed while {phase}: {source}")]
    Upload {
        phase: UploadPhase,
        #[source]
        source: Box<Error>,
    },

    /// The client was configured without a mandatory value.
    ///
    /// This error occurs when:
    /// - The base URL is empty or cannot be parsed
    /// - The API key is empty or not a valid header value
    /// - A video upload is attempted without storage credentials
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The HTTP request could not be completed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A body could not be encoded, or a response could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a video file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The response parsed as JSON but lacked a field the client needs.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Status code of a `Transport` error, looking through upload wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => Some(*status),
            Error::Upload { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Returns the validation failure if this error is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn upload(phase: UploadPhase, source: Error) -> Self {
        Error::Upload {
            phase,
            source: Box::new(source),
        }
    }
}

impl From<reqwest::header::InvalidHeaderValue> for Error {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Error::Configuration(format!("invalid header value: {err}"))
    }
}

/// Category of a local validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    BoundingBox,
    Location,
    EnvironmentData,
    EmptyPayload,
    MissingField,
    InvalidParameter,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationKind::BoundingBox => "bounding_box",
            ValidationKind::Location => "location",
            ValidationKind::EnvironmentData => "environment_data",
            ValidationKind::EmptyPayload => "empty_payload",
            ValidationKind::MissingField => "missing_field",
            ValidationKind::InvalidParameter => "invalid_parameter",
        };
        f.write_str(name)
    }
}

/// A payload rejected before it reached the network.
///
/// The message always names the offending field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub kind: ValidationKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ValidationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_looks_through_upload_wrapper() {
        let inner = Error::Transport {
            status: 403,
            body: "denied".to_string(),
        };
        let err = Error::upload(UploadPhase::Initiated, inner);
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn test_validation_message_is_displayed() {
        let err: Error = ValidationError::new(
            ValidationKind::Location,
            "location must contain 'lat' and 'long' keys",
        )
        .into();
        assert_eq!(
            err.to_string(),
            "Validation error: location must contain 'lat' and 'long' keys"
        );
        assert_eq!(err.as_validation().unwrap().kind, ValidationKind::Location);
    }
}
