//! Persistence error types.
//!
//! All persistence operations return structured errors that provide
//! user-friendly messages and optional remediation hints.

use std::path::PathBuf;
use thiserror::Error;

/// Persistence operation error.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// File I/O error.
    #[error("Failed to {operation} file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blob is not a state record (bad magic, too short).
    #[error("Invalid state record format: {reason}")]
    InvalidFormat { reason: String },

    /// Unsupported schema version.
    #[error("State record version {found} is not supported (maximum: {max_supported})")]
    UnsupportedVersion { found: u32, max_supported: u32 },

    /// Payload digest does not match the header (truncated or corrupted blob).
    #[error("State record checksum mismatch")]
    ChecksumMismatch { expected: String, actual: String },

    /// Parallel key and value sequences have different lengths.
    #[error("State record has {keys} keys but {values} values")]
    MismatchedRecord { keys: usize, values: usize },

    /// The same key appears twice in one record.
    #[error("State record contains duplicate key: {key}")]
    DuplicateKey { key: String },

    /// Serialization error.
    #[error("Failed to serialize state record")]
    Serialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Deserialization error.
    #[error("Failed to deserialize state record")]
    Deserialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Atomic write failed (temp file couldn't be renamed).
    #[error("Failed to complete save operation")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A save running on the blocking pool panicked or was cancelled.
    #[error("Background save task failed")]
    BackgroundTask {
        #[source]
        source: tokio::task::JoinError,
    },

    /// A path that must be a directory is something else.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Storage configuration could not be parsed.
    #[error("Invalid storage configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl PersistenceError {
    /// Whether this error means the file simply does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }

    /// Whether this error came from decoding a blob rather than from I/O.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat { .. }
                | Self::UnsupportedVersion { .. }
                | Self::ChecksumMismatch { .. }
                | Self::MismatchedRecord { .. }
                | Self::DuplicateKey { .. }
                | Self::Deserialization { .. }
        )
    }

    /// Get a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io {
                operation, path, ..
            } => {
                format!("Could not {} the file at {}", operation, path.display())
            }
            Self::InvalidFormat { reason } => {
                format!("The saved state is not in a recognised format: {reason}")
            }
            Self::UnsupportedVersion {
                found,
                max_supported,
            } => {
                format!(
                    "The saved state was written by a newer version \
                    (format version {found}, this build supports up to {max_supported})."
                )
            }
            Self::ChecksumMismatch { .. }
            | Self::MismatchedRecord { .. }
            | Self::DuplicateKey { .. }
            | Self::Deserialization { .. } => {
                "The saved state could not be read. The file may be corrupted.".to_string()
            }
            Self::Serialization { .. } => {
                "An error occurred while encoding the state record.".to_string()
            }
            Self::AtomicWriteFailed { target_path, .. } => {
                format!(
                    "Could not save state to {}. Please check disk space and permissions.",
                    target_path.display()
                )
            }
            Self::BackgroundTask { .. } => {
                "The background save was interrupted before it finished.".to_string()
            }
            Self::NotADirectory { path } => {
                format!("{} exists but is not a directory", path.display())
            }
            Self::Config { path, reason } => {
                format!("The configuration file {} is invalid: {reason}", path.display())
            }
        }
    }

    /// Get a suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Io { operation, .. } => {
                if *operation == "read" {
                    Some("Check that the file exists and you have permission to read it.".into())
                } else {
                    Some("Check that you have permission to write to this location.".into())
                }
            }
            Self::UnsupportedVersion { .. } => Some("Update to the latest release.".into()),
            Self::ChecksumMismatch { .. }
            | Self::MismatchedRecord { .. }
            | Self::DuplicateKey { .. }
            | Self::Deserialization { .. }
            | Self::InvalidFormat { .. } => {
                Some("Delete the state file; it will be recreated on the next save.".into())
            }
            Self::Serialization { .. } => None,
            Self::BackgroundTask { .. } => {
                Some("Save again; the previous file on disk is unchanged.".into())
            }
            Self::AtomicWriteFailed { .. } => {
                Some("Free up disk space or check the storage directory permissions.".into())
            }
            Self::NotADirectory { .. } => {
                Some("Remove the file so the state directory can be created.".into())
            }
            Self::Config { .. } => Some("Fix or remove the configuration file.".into()),
        }
    }
}

/// Result type alias for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = PersistenceError::Io {
            operation: "read",
            path: PathBuf::from("missing"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_not_found());
        assert!(!err.is_decode_error());

        let err = PersistenceError::MismatchedRecord { keys: 2, values: 1 };
        assert!(!err.is_not_found());
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_suggestions() {
        let err = PersistenceError::Io {
            operation: "write",
            path: PathBuf::from("state"),
            source: std::io::Error::other("disk full"),
        };
        assert!(err.suggestion().unwrap().contains("write"));
        assert!(
            PersistenceError::Serialization {
                source: Box::new(std::io::Error::other("x")),
            }
            .suggestion()
            .is_none()
        );
    }
}
