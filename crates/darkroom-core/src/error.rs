//! Error types for the darkroom ingestion pipeline.
//!
//! Errors are organized by concern: blob-store access, per-stage processing,
//! and configuration. Each variant carries the context (bucket, key, format)
//! needed to produce an actionable message.
//!
//! "Too small for processing" is deliberately absent here: it is a terminal
//! business outcome (`ResizeStatus::RejectedTooSmall`), not an error.

use thiserror::Error;

/// Top-level error type for darkroom operations.
#[derive(Error, Debug)]
pub enum DarkroomError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Stage processing errors
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Blob-store access errors, surfaced by `BlobStore` implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested object does not exist
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Underlying I/O failure (network, disk)
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The destination refused the write
    #[error("Quota exceeded for bucket {bucket}")]
    QuotaExceeded { bucket: String },
}

/// Stage processing errors, organized by the step that failed.
///
/// Stages never retry internally: the first failing step terminates the call
/// and the orchestrator owns retry/backoff policy.
#[derive(Error, Debug)]
pub enum StageError {
    /// Fetching the source object failed
    #[error("Failed to fetch s3://{bucket}/{key}: {source}")]
    Fetch {
        bucket: String,
        key: String,
        source: StoreError,
    },

    /// Image decoding failed
    #[error("Decode error for {key}: {message}")]
    Decode { key: String, message: String },

    /// The codec could not identify the image format
    #[error("Unsupported format for {key}")]
    UnsupportedFormat { key: String },

    /// Encoding to a target format failed
    #[error("Failed to encode to {format}: {message}")]
    Encode { format: String, message: String },

    /// Uploading a derived object failed
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        bucket: String,
        key: String,
        source: StoreError,
    },

    /// The event carried a malformed (non-percent-decodable) object key
    #[error("Invalid object key {key:?}: {message}")]
    InvalidKey { key: String, message: String },

    /// A blocking codec task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Join(String),
}

/// Convenience type alias for darkroom results.
pub type Result<T> = std::result::Result<T, DarkroomError>;

/// Convenience type alias for stage-specific results.
pub type StageResult<T> = std::result::Result<T, StageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_messages_carry_context() {
        let err = StageError::Fetch {
            bucket: "albums-originals".to_string(),
            key: "2024/beach.jpg".to_string(),
            source: StoreError::NotFound {
                bucket: "albums-originals".to_string(),
                key: "2024/beach.jpg".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("albums-originals"));
        assert!(msg.contains("2024/beach.jpg"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_store_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = StoreError::from(io);
        assert!(matches!(err, StoreError::Io(_)));
    }
}
