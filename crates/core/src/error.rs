//! Error types for the header-crop-core library.
//!
//! This module provides granular error variants for the failure modes of the
//! crop pipeline, so the dialog can tell a broken export from a rejected
//! upload and report both the same way to the user.

use thiserror::Error;

/// Errors that can occur within the header-crop-core library.
///
/// Each variant represents a specific failure mode with contextual information
/// to help diagnose and handle errors appropriately.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (missing keys, invalid values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required environment variable was not found.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// The source image could not be fetched or decoded.
    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    /// Image processing (geometry, warping, overlay) failed.
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    /// The rendered bitmap could not be exported as JPEG.
    #[error("Export failed: {0}")]
    Export(String),

    /// Confirm was requested before a crop was completed.
    #[error("No completed crop to process")]
    EmptyCrop,

    /// The upload endpoint answered with a non-success status.
    #[error("Upload rejected with HTTP {status}: {body}")]
    UploadFailed {
        /// HTTP status code returned by the endpoint.
        status: u16,
        /// Response body, kept for the log.
        body: String,
    },

    /// Transport-level failure talking to the CMS.
    #[error("Network error: {0}")]
    Network(String),

    /// The CMS answered 2xx but the body was not what we expect.
    #[error("Invalid upload response: {0}")]
    InvalidResponse(String),

    /// UI-related errors (rendering, window management).
    #[error("UI error: {0}")]
    Ui(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an image loading error with the given message.
    pub fn load(msg: impl Into<String>) -> Self {
        Self::ImageLoad(msg.into())
    }

    /// Creates an image processing error with the given message.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::ImageProcessing(msg.into())
    }

    /// Creates an export error with the given message.
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Creates a UI error with the given message.
    pub fn ui(msg: impl Into<String>) -> Self {
        Self::Ui(msg.into())
    }

    /// Returns true for failures of the upload leg (endpoint or transport).
    pub fn is_upload_failure(&self) -> bool {
        matches!(
            self,
            Self::UploadFailed { .. } | Self::Network(_) | Self::InvalidResponse(_)
        )
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
