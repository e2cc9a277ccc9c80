//! Side-by-side playback
//!
//! The media element seam and the synchronizer that drives two elements as
//! a single transport.

pub mod element;
pub mod sync;

pub use element::{MediaElement, PlaybackError, PlaybackResult};
pub use sync::{fraction_from_percent, progress_percent, DualPlaybackSync, PlaybackState, DEFAULT_VOLUME};
