//! Camera capture
//!
//! Camera sources, the capture component that owns a stream while it is
//! mounted, and the registry of recorded clip URLs.

pub mod clip;
pub mod component;
pub mod traits;

#[cfg(feature = "camera")]
pub mod webcam;

#[cfg(test)]
pub(crate) mod fake;

pub use clip::{Clip, ClipRegistry, CLIP_URL_PREFIX};
pub use component::{
    countdown_tick, CameraState, CaptureComponent, CaptureOptions, CaptureStatus, PreviewSource,
};
pub use traits::{
    CameraInfo, CameraSource, CaptureError, CaptureResult, MediaStream, Resolution, SegmentReceiver,
    StreamConstraints, TrackInfo, TrackKind,
};
