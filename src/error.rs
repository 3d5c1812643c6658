//! Error types for the analysis pipeline
//!
//! Format-level failures never show up here: an extractor that cannot parse
//! its input yields an unavailable record instead. What remains are the
//! conditions that stop a run before or outside the per-format work.

use std::fmt;
use std::io;

/// Result type alias for pipeline operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Errors surfaced to the caller of an analysis run
#[derive(Debug)]
pub enum AnalysisError {
    /// Input exceeds the size cap; nothing was analysed
    InputRejected { size: u64, limit: u64 },
    /// I/O error while building a byte source from disk
    Io(io::Error),
    /// Configuration could not be read or parsed
    Config(String),
    /// Report serialization error
    Serialization(serde_json::Error),
    /// A pipeline task panicked or was cancelled
    Join(String),
    /// Unexpected orchestration failure
    Failed(String),
}

impl AnalysisError {
    /// True when the run never started because of the size cap
    pub fn is_rejection(&self) -> bool {
        matches!(self, AnalysisError::InputRejected { .. })
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InputRejected { size, limit } => write!(
                f,
                "File exceeds {}MB limit ({} bytes > {} bytes)",
                limit / (1024 * 1024),
                size,
                limit
            ),
            AnalysisError::Io(e) => write!(f, "I/O error: {}", e),
            AnalysisError::Config(e) => write!(f, "Configuration error: {}", e),
            AnalysisError::Serialization(e) => write!(f, "Serialization error: {}", e),
            AnalysisError::Join(e) => write!(f, "File analysis failed: task aborted: {}", e),
            AnalysisError::Failed(e) => write!(f, "File analysis failed: {}", e),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Io(e) => Some(e),
            AnalysisError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for AnalysisError {
    fn from(err: io::Error) -> Self {
        AnalysisError::Io(err)
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Serialization(err)
    }
}

impl From<toml::de::Error> for AnalysisError {
    fn from(err: toml::de::Error) -> Self {
        AnalysisError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AnalysisError {
    fn from(err: tokio::task::JoinError) -> Self {
        AnalysisError::Join(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message() {
        let err = AnalysisError::InputRejected { size: 60 * 1024 * 1024, limit: 50 * 1024 * 1024 };
        assert!(err.is_rejection());
        assert!(err.to_string().starts_with("File exceeds 50MB limit"));
    }

    #[test]
    fn test_io_source_is_exposed() {
        use std::error::Error;
        let err = AnalysisError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.source().is_some());
        assert!(!err.is_rejection());
    }
}
