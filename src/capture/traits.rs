//! Capture trait definitions
//!
//! Platform-agnostic traits for camera sources and their live streams.

use crate::config::CaptureConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Capture-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("No camera stream; start the camera first")]
    NotReady,

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Camera stream ended")]
    StreamEnded,

    #[error("Recording was cancelled during the countdown")]
    CountdownCancelled,

    #[error("Video encoder failed: {0}")]
    Encoder(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Receiving end of a recorder tap: one encoded segment per message.
pub type SegmentReceiver = mpsc::UnboundedReceiver<Vec<u8>>;

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Supported resolutions
    pub supported_resolutions: Vec<Resolution>,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// A single device track inside a stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
}

/// What to ask the platform for when acquiring a camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConstraints {
    pub video: bool,
    pub audio: bool,
    pub device_id: Option<String>,
    pub resolution: Resolution,
    pub fps: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for StreamConstraints {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            video: true,
            audio: config.audio,
            device_id: config.device_id.clone(),
            resolution: Resolution {
                width: config.width,
                height: config.height,
            },
            fps: config.fps,
        }
    }
}

/// A source of camera streams (the platform's `getUserMedia`).
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Enumerate available cameras
    fn list_cameras(&self) -> Vec<CameraInfo>;

    /// Open a live stream. Fails with `PermissionDenied` or
    /// `DeviceUnavailable`.
    async fn acquire(&self, constraints: &StreamConstraints) -> CaptureResult<Arc<dyn MediaStream>>;
}

/// A live device stream.
///
/// Implementations use interior mutability; `stop` must be idempotent.
pub trait MediaStream: Send + Sync {
    /// Stream identifier
    fn id(&self) -> &str;

    /// Tracks carried by this stream
    fn tracks(&self) -> Vec<TrackInfo>;

    /// MIME type of the segments produced by [`MediaStream::record`]
    fn mime_type(&self) -> &str;

    /// Whether the device tracks are still running
    fn is_live(&self) -> bool;

    /// Open a recorder tap. Segments flow until the receiver is dropped or
    /// the stream stops.
    fn record(&self) -> CaptureResult<SegmentReceiver>;

    /// End the current take. Open taps deliver whatever their encoder still
    /// has buffered and then close. The device keeps running.
    fn finish_recording(&self);

    /// Stop all device tracks
    fn stop(&self);
}
