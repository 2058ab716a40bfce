//! Error types and handling
//!
//! `CaptureError` is the typed failure of the capture pipeline. Every variant
//! maps to exactly one `ErrorKind`, so callers classify failures (and route
//! authorization problems to remediation) without looking at message text.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Failure classes of the capture pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    PermissionDenied,
    NoDisplay,
    CaptureFailed,
    EncodeFailed,
    DirectoryUnavailable,
    WriteFailed,
    NameCollision,
    Busy,
    Cancelled,
}

impl ErrorKind {
    /// Stable machine-readable code for UI layers
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::NoDisplay => "NO_DISPLAY",
            ErrorKind::CaptureFailed => "CAPTURE_FAILED",
            ErrorKind::EncodeFailed => "ENCODE_FAILED",
            ErrorKind::DirectoryUnavailable => "DIRECTORY_UNAVAILABLE",
            ErrorKind::WriteFailed => "WRITE_FAILED",
            ErrorKind::NameCollision => "NAME_COLLISION",
            ErrorKind::Busy => "BUSY",
            ErrorKind::Cancelled => "CANCELLED",
        }
    }
}

/// Pipeline stage a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Request admission (re-entrancy guard)
    Request,
    Probe,
    Enumerate,
    Capture,
    Encode,
    Save,
}

/// Capture pipeline error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Screen recording permission not granted: {0}")]
    PermissionDenied(String),

    #[error("No capturable display found")]
    NoDisplay,

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("PNG encoding failed: {0}")]
    EncodeFailed(String),

    #[error("No writable save directory: {0}")]
    DirectoryUnavailable(String),

    #[error("Failed to write screenshot: {0}")]
    WriteFailed(String),

    #[error("File already exists: {}", .0.display())]
    NameCollision(PathBuf),

    #[error("A capture is already in progress")]
    Busy,

    #[error("Capture cancelled")]
    Cancelled,
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CaptureError::NoDisplay => ErrorKind::NoDisplay,
            CaptureError::CaptureFailed(_) => ErrorKind::CaptureFailed,
            CaptureError::EncodeFailed(_) => ErrorKind::EncodeFailed,
            CaptureError::DirectoryUnavailable(_) => ErrorKind::DirectoryUnavailable,
            CaptureError::WriteFailed(_) => ErrorKind::WriteFailed,
            CaptureError::NameCollision(_) => ErrorKind::NameCollision,
            CaptureError::Busy => ErrorKind::Busy,
            CaptureError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Underlying detail without the kind prefix
    pub fn detail(&self) -> String {
        match self {
            CaptureError::PermissionDenied(detail)
            | CaptureError::CaptureFailed(detail)
            | CaptureError::EncodeFailed(detail)
            | CaptureError::DirectoryUnavailable(detail)
            | CaptureError::WriteFailed(detail) => detail.clone(),
            CaptureError::NameCollision(path) => path.display().to_string(),
            CaptureError::NoDisplay | CaptureError::Busy | CaptureError::Cancelled => {
                self.to_string()
            }
        }
    }

    /// Whether the failure stems from OS capture authorization
    pub fn is_authorization(&self) -> bool {
        self.kind() == ErrorKind::PermissionDenied
    }
}

/// Application-level error (configuration, CLI plumbing)
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Error response for UI layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&CaptureError> for ErrorResponse {
    fn from(error: &CaptureError) -> Self {
        ErrorResponse {
            code: error.kind().code().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Capture(inner) => inner.kind().code(),
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
