//! Canned performance feedback
//!
//! Analysis is mocked: every session gets the same report.

use serde::{Deserialize, Serialize};

/// Match score shown on the feedback step
pub const CANNED_SCORE: u8 = 82;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackCategory {
    Positive,
    Improvement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackItem {
    pub category: FeedbackCategory,
    pub title: String,
    pub description: String,
}

impl FeedbackItem {
    fn new(category: FeedbackCategory, title: &str, description: &str) -> Self {
        Self {
            category,
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// Coarse label for a match score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Great,
    Good,
    Fair,
    NeedsWork,
}

impl Rating {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => Rating::Great,
            70..=79 => Rating::Good,
            50..=69 => Rating::Fair,
            _ => Rating::NeedsWork,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rating::Great => "Great",
            Rating::Good => "Good",
            Rating::Fair => "Fair",
            Rating::NeedsWork => "Needs work",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackReport {
    /// Percentage match with the reference, 0..=100
    pub score: u8,
    pub rating: Rating,
    pub items: Vec<FeedbackItem>,
    pub suggestions: Vec<String>,
}

impl FeedbackReport {
    pub fn positives(&self) -> impl Iterator<Item = &FeedbackItem> {
        self.items
            .iter()
            .filter(|item| item.category == FeedbackCategory::Positive)
    }

    pub fn improvements(&self) -> impl Iterator<Item = &FeedbackItem> {
        self.items
            .iter()
            .filter(|item| item.category == FeedbackCategory::Improvement)
    }
}

/// The fixed report shown after "analysis"
pub fn canned_report() -> FeedbackReport {
    use FeedbackCategory::*;

    FeedbackReport {
        score: CANNED_SCORE,
        rating: Rating::from_score(CANNED_SCORE),
        items: vec![
            FeedbackItem::new(
                Positive,
                "Excellent arm positioning",
                "Your arm extensions and positions closely match the reference video, showing good control and form.",
            ),
            FeedbackItem::new(
                Improvement,
                "Timing adjustment needed",
                "Your movements are slightly behind the beat. Try to anticipate the rhythm more.",
            ),
            FeedbackItem::new(
                Positive,
                "Good posture",
                "You maintain proper posture throughout most of the routine.",
            ),
            FeedbackItem::new(
                Improvement,
                "Foot placement",
                "Your foot placement could be more precise during turns. Focus on landing positions.",
            ),
        ],
        suggestions: vec![
            "Focus on synchronizing your movements with the beat, especially during the chorus section.".to_string(),
            "Practice the turn sequence at 0:45 to improve stability and precision.".to_string(),
            "Your energy level drops slightly in the middle section - maintain consistent energy throughout.".to_string(),
            "The arm sequence at 1:20 needs more fluidity between positions.".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canned_report_contents() {
        let report = canned_report();
        assert_eq!(report.score, 82);
        assert_eq!(report.rating, Rating::Great);
        assert_eq!(report.items.len(), 4);
        assert_eq!(report.positives().count(), 2);
        assert_eq!(report.improvements().count(), 2);
        assert_eq!(report.items[0].title, "Excellent arm positioning");
        assert_eq!(report.suggestions.len(), 4);
    }

    #[test]
    fn test_report_is_stable() {
        assert_eq!(canned_report(), canned_report());
    }

    #[test]
    fn test_rating_bands() {
        assert_eq!(Rating::from_score(100), Rating::Great);
        assert_eq!(Rating::from_score(80), Rating::Great);
        assert_eq!(Rating::from_score(78), Rating::Good);
        assert_eq!(Rating::from_score(55), Rating::Fair);
        assert_eq!(Rating::from_score(10).label(), "Needs work");
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(canned_report()).unwrap();
        assert_eq!(json["score"], 82);
        assert_eq!(json["rating"], "great");
        assert_eq!(json["items"][1]["category"], "improvement");
    }
}
