//! Error types and handling
//!
//! Common error types used across the application. Each component has its
//! own error enum; all of them fold into [`AppError`] at the command layer.

use crate::capture::CaptureError;
use crate::playback::PlaybackError;
use crate::session::SessionError;
use crate::upload::UploadError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Window error: {0}")]
    Window(String),
}

impl From<CaptureError> for AppError {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::PermissionDenied(msg) => AppError::PermissionDenied(msg),
            CaptureError::DeviceUnavailable(msg) => AppError::DeviceUnavailable(msg),
            CaptureError::NotReady | CaptureError::CountdownCancelled => {
                AppError::NotReady(error.to_string())
            }
            other => AppError::DeviceUnavailable(other.to_string()),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::Io(e) => AppError::Io(e),
            other => AppError::UploadFailed(other.to_string()),
        }
    }
}

impl From<PlaybackError> for AppError {
    fn from(error: PlaybackError) -> Self {
        AppError::PlaybackFailed(error.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        AppError::Session(error.to_string())
    }
}

/// Error response for frontend
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            AppError::NotReady(_) => "NOT_READY",
            AppError::UploadFailed(_) => "UPLOAD_FAILED",
            AppError::PlaybackFailed(_) => "PLAYBACK_FAILED",
            AppError::Session(_) => "SESSION_ERROR",
            AppError::Window(_) => "WINDOW_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
