//! Media element abstraction
//!
//! The synchronizer drives two of these. A host adapts whatever actually
//! plays the video (a webview `<video>`, a native player) to this trait.

use async_trait::async_trait;
use thiserror::Error;

/// Playback-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The platform refused to start playback (e.g. autoplay policy)
    #[error("Error playing {element}: {reason}")]
    Rejected { element: String, reason: String },
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// A single playable media element.
///
/// Methods take `&self`; implementations use interior mutability so the
/// element can be shared with the polling task.
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Human-readable name used in logs ("reference", "user")
    fn label(&self) -> &str;

    fn set_source(&self, url: &str);

    /// Start playback. Resolves once the platform accepted or refused.
    async fn play(&self) -> PlaybackResult<()>;

    fn pause(&self);

    /// Current position in seconds
    fn current_time(&self) -> f64;

    fn set_current_time(&self, seconds: f64);

    /// Duration in seconds; `NaN` or 0 while unknown
    fn duration(&self) -> f64;

    fn set_volume(&self, volume: f64);

    fn set_muted(&self, muted: bool);
}
