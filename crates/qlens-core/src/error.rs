//! Error types for trace ingestion
//!
//! Two kinds of failures exist while reading a trace:
//!
//! - **File-level** (`MalformedFile`, `DuplicateFile`, `Io`): the file cannot be used at
//!   all and is rejected as a whole. Other files keep processing.
//! - **Event-level** (`UnrecognizedEvent`): one record has an unknown name or an incomplete
//!   payload. The record is dropped and the rest of the file stays usable.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading and decoding trace files
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("{file} is not a valid trace file: {reason}")]
    MalformedFile { file: String, reason: String },

    #[error("A '{name}' event in {file} has invalid data: {data} ({reason})")]
    UnrecognizedEvent {
        file: String,
        name: String,
        data: serde_json::Value,
        reason: String,
    },

    #[error("A trace named {0} is already loaded")]
    DuplicateFile(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TraceError {
    pub fn malformed(file: &str, reason: impl Into<String>) -> Self {
        TraceError::MalformedFile {
            file: file.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unrecognized(
        file: &str,
        name: &str,
        data: &serde_json::Value,
        reason: impl Into<String>,
    ) -> Self {
        TraceError::UnrecognizedEvent {
            file: file.to_string(),
            name: name.to_string(),
            data: data.clone(),
            reason: reason.into(),
        }
    }

    /// Whether this error invalidates the whole file
    pub fn is_file_level(&self) -> bool {
        !matches!(self, TraceError::UnrecognizedEvent { .. })
    }
}

/// Result type for trace ingestion
pub type TraceResult<T> = Result<T, TraceError>;
