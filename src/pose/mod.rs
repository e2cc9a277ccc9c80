//! Pose overlay
//!
//! Landmark estimation is delegated to an external [`PoseEstimator`]; this
//! module owns its lifetime and draws the result.

pub mod canvas;
pub mod landmarks;

pub use canvas::{draw_pose, Canvas, DrawStats, DrawingStyle, FrameCanvas, Rgba};
pub use landmarks::{
    Keypoint, Landmark, PoseLandmarks, LANDMARK_COUNT, POSE_CONNECTIONS, VISIBILITY_THRESHOLD,
};

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Estimator tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoseOptions {
    /// 0 (lite), 1 (full) or 2 (heavy)
    pub model_complexity: u8,
    pub smooth_landmarks: bool,
    pub enable_segmentation: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for PoseOptions {
    fn default() -> Self {
        Self {
            model_complexity: 1,
            smooth_landmarks: true,
            enable_segmentation: false,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

impl PoseOptions {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.model_complexity > 2 {
            bail!("model complexity must be 0, 1 or 2, got {}", self.model_complexity);
        }
        for (name, value) in [
            ("detection", self.min_detection_confidence),
            ("tracking", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("min {} confidence must be within 0..=1, got {}", name, value);
            }
        }
        Ok(())
    }
}

/// External landmark estimator
pub trait PoseEstimator: Send {
    fn set_options(&mut self, options: &PoseOptions) -> anyhow::Result<()>;

    /// Landmarks for one RGBA frame, or `None` when no body was found
    fn estimate(&mut self, frame: &FrameCanvas) -> anyhow::Result<Option<PoseLandmarks>>;

    /// Release model resources
    fn close(&mut self) {}
}

/// An explicitly opened estimator plus drawing style
pub struct PoseSession {
    estimator: Option<Box<dyn PoseEstimator>>,
    style: DrawingStyle,
    frames: u64,
    detections: u64,
}

impl PoseSession {
    pub fn open(mut estimator: Box<dyn PoseEstimator>, options: &PoseOptions) -> anyhow::Result<Self> {
        options.validate()?;
        estimator.set_options(options)?;
        tracing::info!(
            "Pose session opened (complexity {}, smoothing {})",
            options.model_complexity,
            options.smooth_landmarks
        );
        Ok(Self {
            estimator: Some(estimator),
            style: DrawingStyle::default(),
            frames: 0,
            detections: 0,
        })
    }

    pub fn with_style(mut self, style: DrawingStyle) -> Self {
        self.style = style;
        self
    }

    pub fn is_open(&self) -> bool {
        self.estimator.is_some()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    pub fn detections(&self) -> u64 {
        self.detections
    }

    /// Estimate landmarks for `frame` and draw them onto it
    pub fn process_frame(&mut self, frame: &mut FrameCanvas) -> anyhow::Result<Option<PoseLandmarks>> {
        let Some(estimator) = self.estimator.as_mut() else {
            bail!("pose session is closed");
        };

        let landmarks = estimator.estimate(frame)?;
        self.frames += 1;
        if let Some(landmarks) = &landmarks {
            self.detections += 1;
            let stats = draw_pose(frame, landmarks, &self.style);
            tracing::trace!("Drew {} bones, {} joints", stats.lines, stats.dots);
        }
        Ok(landmarks)
    }

    /// Draw landmarks produced elsewhere onto `canvas`
    pub fn draw(&self, canvas: &mut dyn Canvas, landmarks: &PoseLandmarks) -> DrawStats {
        draw_pose(canvas, landmarks, &self.style)
    }

    /// Idempotent
    pub fn close(&mut self) {
        if let Some(mut estimator) = self.estimator.take() {
            estimator.close();
            tracing::info!(
                "Pose session closed after {} frames ({} detections)",
                self.frames,
                self.detections
            );
        }
    }
}

impl Drop for PoseSession {
    fn drop(&mut self) {
        self.close();
    }
}
