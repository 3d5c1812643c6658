//! The input file: bytes plus the attributes its provider declared

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AnalysisError, AnalysisResult};

/// Read-only view over one input file.
///
/// The declared name and MIME come from whoever handed the file over and are
/// never corrected by content sniffing.
#[derive(Clone)]
pub struct ByteSource {
    name: String,
    declared_mime: String,
    last_modified: DateTime<Utc>,
    bytes: Vec<u8>,
}

impl ByteSource {
    pub fn new(
        name: impl Into<String>,
        declared_mime: impl Into<String>,
        last_modified: DateTime<Utc>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_mime: declared_mime.into(),
            last_modified,
            bytes,
        }
    }

    /// Read a file from disk. The declared MIME is guessed from the file-name
    /// extension and the modification time comes from the file system.
    pub fn from_path(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        Self::load(path.as_ref(), None)
    }

    /// Like [`ByteSource::from_path`], but a file larger than `limit` bytes
    /// is rejected from its metadata without being read.
    pub fn from_path_with_limit(path: impl AsRef<Path>, limit: u64) -> AnalysisResult<Self> {
        Self::load(path.as_ref(), Some(limit))
    }

    fn load(path: &Path, limit: Option<u64>) -> AnalysisResult<Self> {
        let metadata = std::fs::metadata(path)?;
        if let Some(limit) = limit {
            let size = metadata.len();
            if size > limit {
                info!(path = %path.display(), size, limit, "Input rejected before reading: size limit exceeded");
                return Err(AnalysisError::InputRejected { size, limit });
            }
        }
        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let bytes = std::fs::read(path)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let declared_mime = mime_from_name(&name).unwrap_or_default();

        debug!(path = %path.display(), bytes = bytes.len(), mime = declared_mime, "Loaded byte source");
        Ok(Self::new(name, declared_mime, last_modified, bytes))
    }

    /// Replace the declared MIME type, keeping the bytes
    pub fn with_declared_mime(mut self, declared_mime: impl Into<String>) -> Self {
        self.declared_mime = declared_mime.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared MIME type, empty when the provider gave none
    pub fn declared_mime(&self) -> &str {
        &self.declared_mime
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lower-cased text after the last `.` of the name
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }

    /// Reject input above `limit` bytes before any analysis starts
    pub fn check_size(&self, limit: u64) -> AnalysisResult<()> {
        let size = self.size();
        if size > limit {
            info!(name = %self.name, size, limit, "Input rejected: size limit exceeded");
            return Err(AnalysisError::InputRejected { size, limit });
        }
        Ok(())
    }

    pub fn summary(&self) -> SourceSummary {
        SourceSummary {
            name: self.name.clone(),
            declared_mime: if self.declared_mime.is_empty() {
                None
            } else {
                Some(self.declared_mime.clone())
            },
            size_bytes: self.size(),
            size_display: format_file_size(self.size()),
            last_modified: self.last_modified,
        }
    }
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSource")
            .field("name", &self.name)
            .field("declared_mime", &self.declared_mime)
            .field("last_modified", &self.last_modified)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Declared attributes of a source as recorded in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub name: String,
    pub declared_mime: Option<String>,
    pub size_bytes: u64,
    pub size_display: String,
    pub last_modified: DateTime<Utc>,
}

pub(crate) fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_lowercase())
}

/// `"{n} bytes ({x.xx} GB|MB|KB)"` in 1024 steps, plain `"{n} bytes"` below 1 KiB
pub fn format_file_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    let gb = mb / 1024.0;

    if gb >= 1.0 {
        format!("{} bytes ({:.2} GB)", bytes, gb)
    } else if mb >= 1.0 {
        format!("{} bytes ({:.2} MB)", bytes, mb)
    } else if kb >= 1.0 {
        format!("{} bytes ({:.2} KB)", bytes, kb)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Browser-style MIME guess from a file-name extension
pub fn mime_from_name(name: &str) -> Option<&'static str> {
    let mime = match extension_of(name)?.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "3gp" => "video/3gpp",
        "txt" => "text/plain",
        "eml" => "message/rfc822",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    };
    Some(mime)
}
