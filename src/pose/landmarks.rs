//! Body landmarks
//!
//! 33-point body model with normalized image coordinates.

use serde::{Deserialize, Serialize};

/// Landmarks below this visibility are not drawn
pub const VISIBILITY_THRESHOLD: f32 = 0.5;

pub const LANDMARK_COUNT: usize = 33;

/// Index into [`PoseLandmarks::keypoints`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum Landmark {
    Nose = 0,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl Landmark {
    pub fn index(self) -> usize {
        self as usize
    }
}

use Landmark::*;

/// Bones drawn between landmarks
pub const POSE_CONNECTIONS: [(Landmark, Landmark); 35] = [
    // Face
    (Nose, LeftEyeInner),
    (LeftEyeInner, LeftEye),
    (LeftEye, LeftEyeOuter),
    (LeftEyeOuter, LeftEar),
    (Nose, RightEyeInner),
    (RightEyeInner, RightEye),
    (RightEye, RightEyeOuter),
    (RightEyeOuter, RightEar),
    (MouthLeft, MouthRight),
    // Arms and hands
    (LeftShoulder, RightShoulder),
    (LeftShoulder, LeftElbow),
    (LeftElbow, LeftWrist),
    (LeftWrist, LeftPinky),
    (LeftWrist, LeftIndex),
    (LeftWrist, LeftThumb),
    (LeftPinky, LeftIndex),
    (RightShoulder, RightElbow),
    (RightElbow, RightWrist),
    (RightWrist, RightPinky),
    (RightWrist, RightIndex),
    (RightWrist, RightThumb),
    (RightPinky, RightIndex),
    // Torso
    (LeftShoulder, LeftHip),
    (RightShoulder, RightHip),
    (LeftHip, RightHip),
    // Legs and feet
    (LeftHip, LeftKnee),
    (RightHip, RightKnee),
    (LeftKnee, LeftAnkle),
    (RightKnee, RightAnkle),
    (LeftAnkle, LeftHeel),
    (RightAnkle, RightHeel),
    (LeftHeel, LeftFootIndex),
    (RightHeel, RightFootIndex),
    (LeftAnkle, LeftFootIndex),
    (RightAnkle, RightFootIndex),
];

/// A single detected point. `x` and `y` are normalized to the frame,
/// `z` is relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visibility >= VISIBILITY_THRESHOLD && self.x.is_finite() && self.y.is_finite()
    }

    /// Pixel position in a `width` x `height` frame
    pub fn to_pixel(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// Estimator output for one frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseLandmarks {
    pub keypoints: Vec<Keypoint>,
}

impl PoseLandmarks {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, landmark: Landmark) -> Option<&Keypoint> {
        self.keypoints.get(landmark.index())
    }

    pub fn visible(&self, landmark: Landmark) -> Option<&Keypoint> {
        self.get(landmark).filter(|k| k.is_visible())
    }
}
