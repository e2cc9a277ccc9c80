//! Session state
//!
//! The step machine and the two video references the controller owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current step of the comparison flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Waiting for a reference video
    #[default]
    Upload,
    /// Recording the user's attempt
    Record,
    /// Side by side playback
    Compare,
    /// Canned analysis
    Feedback,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Upload, Step::Record, Step::Compare, Step::Feedback];

    /// Zero-based position in the flow
    pub fn index(&self) -> usize {
        match self {
            Step::Upload => 0,
            Step::Record => 1,
            Step::Compare => 2,
            Step::Feedback => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Step::Upload => "Upload",
            Step::Record => "Record",
            Step::Compare => "Compare",
            Step::Feedback => "Feedback",
        }
    }

    /// Progress bar fill for this step
    pub fn progress_percent(&self) -> u8 {
        match self {
            Step::Upload => 0,
            Step::Record => 33,
            Step::Compare => 66,
            Step::Feedback => 100,
        }
    }

    /// Whether `other` is already behind this step
    pub fn is_past(&self, other: Step) -> bool {
        other.index() < self.index()
    }
}

/// One pass through the flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub step: Step,
    pub reference_video: Option<String>,
    pub user_video: Option<String>,
    /// Feedback "analysis" in progress
    pub is_analyzing: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            step: Step::Upload,
            reference_video: None,
            user_video: None,
            is_analyzing: false,
        }
    }

    pub fn progress_percent(&self) -> u8 {
        self.step.progress_percent()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
