//! Where video bytes come from, and how they are cut into parts.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};
use crate::validation;

pub(crate) const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// A video file on disk or an in-memory buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for VideoSource {
    fn from(path: PathBuf) -> Self {
        VideoSource::Path(path)
    }
}

impl From<&Path> for VideoSource {
    fn from(path: &Path) -> Self {
        VideoSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for VideoSource {
    fn from(bytes: Vec<u8>) -> Self {
        VideoSource::Bytes(bytes)
    }
}

impl From<&[u8]> for VideoSource {
    fn from(bytes: &[u8]) -> Self {
        VideoSource::Bytes(bytes.to_vec())
    }
}

impl VideoSource {
    /// Content length; files are measured without reading them.
    pub(crate) async fn len(&self) -> Result<u64> {
        match self {
            VideoSource::Path(path) => Ok(tokio::fs::metadata(path).await?.len()),
            VideoSource::Bytes(bytes) => Ok(bytes.len() as u64),
        }
    }

    /// Explicit type, else a guess from the file extension, else mp4.
    pub(crate) fn content_type(&self, explicit: Option<&str>) -> String {
        if let Some(content_type) = explicit.filter(|c| !c.trim().is_empty()) {
            return content_type.to_string();
        }
        match self {
            VideoSource::Path(path) => mime_guess::from_path(path)
                .first()
                .map(|mime| mime.essence_str().to_string())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            VideoSource::Bytes(_) => DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    pub(crate) async fn read_all(self) -> Result<Vec<u8>> {
        match self {
            VideoSource::Path(path) => Ok(tokio::fs::read(path).await?),
            VideoSource::Bytes(bytes) => Ok(bytes),
        }
    }

    pub(crate) async fn chunks(self, part_size: u64) -> Result<Chunks> {
        let inner = match self {
            VideoSource::Path(path) => ChunkSource::File(File::open(path).await?),
            VideoSource::Bytes(bytes) => ChunkSource::Bytes { bytes, offset: 0 },
        };
        Ok(Chunks { inner, part_size })
    }
}

pub(crate) fn ensure_non_empty(len: u64) -> Result<()> {
    if len == 0 {
        validation::non_empty_bytes(&[], "video")?;
    }
    Ok(())
}

/// File extension used in the object key.
pub(crate) fn extension_for(content_type: &str) -> String {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    let known = match essence.as_str() {
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        "video/x-msvideo" => Some("avi"),
        "video/x-matroska" => Some("mkv"),
        "video/mpeg" => Some("mpeg"),
        "video/h264" => Some("h264"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }
    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| "bin".to_string())
}

enum ChunkSource {
    File(File),
    Bytes { bytes: Vec<u8>, offset: usize },
}

/// Sequential fixed-size chunks; only the last one may be short.
pub(crate) struct Chunks {
    inner: ChunkSource,
    part_size: u64,
}

impl Chunks {
    pub(crate) async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let part_size = usize::try_from(self.part_size)
            .map_err(|_| Error::Configuration(format!("part size {} is too large", self.part_size)))?;
        match &mut self.inner {
            ChunkSource::Bytes { bytes, offset } => {
                if *offset >= bytes.len() {
                    return Ok(None);
                }
                let end = (*offset + part_size).min(bytes.len());
                let chunk = bytes[*offset..end].to_vec();
                *offset = end;
                Ok(Some(chunk))
            }
            ChunkSource::File(file) => {
                let mut chunk = Vec::with_capacity(part_size);
                let read = file.take(self.part_size).read_to_end(&mut chunk).await?;
                if read == 0 {
                    return Ok(None);
                }
                Ok(Some(chunk))
            }
        }
    }
}
