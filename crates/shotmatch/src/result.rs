//! Result and error types for shotmatch.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for shotmatch operations
pub type ShotmatchResult<T> = Result<T, ShotmatchError>;

/// Errors that can occur while matching screenshots
///
/// Only environmental failures end up here. A missing baseline or a
/// perceptual mismatch is a decision branch and is reported through
/// [`crate::MatcherResult`] instead.
#[derive(Debug, Error)]
pub enum ShotmatchError {
    /// The assertion was called without a usable snapshot name
    #[error("A snapshot name is required")]
    SnapshotNameRequired,

    /// Capturing the target failed
    #[error("Screenshot failed: {message}")]
    Capture {
        /// Error message
        message: String,
    },

    /// The perceptual comparison failed to run
    #[error("Image comparison failed: {message}")]
    Comparison {
        /// Error message
        message: String,
    },

    /// Encoding or decoding an image failed
    #[error("Image processing failed: {message}")]
    ImageProcessing {
        /// Error message
        message: String,
    },

    /// The baseline disappeared between the existence check and the read
    #[error("Failed to read baseline {}: {source}", path.display())]
    ReadBaseline {
        /// Baseline path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Writing an image artifact failed
    #[error("Failed to write {}: {source}", path.display())]
    WriteArtifact {
        /// Artifact path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The assertion did not hold
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ShotmatchError {
    /// Create a capture error
    #[must_use]
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture {
            message: message.into(),
        }
    }

    /// Create a comparison error
    #[must_use]
    pub fn comparison(message: impl Into<String>) -> Self {
        Self::Comparison {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_name_required_message() {
        assert_eq!(
            ShotmatchError::SnapshotNameRequired.to_string(),
            "A snapshot name is required"
        );
    }

    #[test]
    fn test_read_baseline_includes_path() {
        let err = ShotmatchError::ReadBaseline {
            path: PathBuf::from("snaps/home.png"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let text = err.to_string();
        assert!(text.contains("snaps/home.png"));
        assert!(text.contains("gone"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ShotmatchError = io.into();
        assert!(matches!(err, ShotmatchError::Io(_)));
    }

    #[test]
    fn test_helper_constructors() {
        assert!(ShotmatchError::capture("x").to_string().contains("Screenshot failed"));
        assert!(ShotmatchError::comparison("x")
            .to_string()
            .contains("Image comparison failed"));
        assert!(ShotmatchError::config("x")
            .to_string()
            .contains("Configuration error"));
    }
}
