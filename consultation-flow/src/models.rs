use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Literal used when a plant marker carries no effectiveness segment
pub const UNSPECIFIED_EFFECTIVENESS: &str = "No especificada";

/// Allergy answer recorded when the patient leaves the field blank
pub const NO_ALLERGIES: &str = "ninguna";

/// Patient answers collected one field at a time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub symptoms: Option<String>,
    pub duration: Option<String>,
    pub allergies: Option<String>,
}

/// Treatment feedback gathered across the four feedback steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackData {
    /// 1..=5
    pub effectiveness: Option<u8>,
    pub side_effects: Option<String>,
    pub time_to_improvement: Option<String>,
    pub additional_comments: Option<String>,
}

/// A plant recovered from a `PLANTA_<n>:` marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantRecord {
    pub name: String,
    pub description: String,
    pub effectiveness: String,
}

/// A candidate plant and its confidence, in order of first appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionEntry {
    pub name: String,
    /// Percentage-like score; NaN when the source value was not numeric
    pub confidence: f64,
}

impl PredictionEntry {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// What the flow keeps from a successful recommendation reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub answer: String,
    pub plants: Vec<PlantRecord>,
    pub confidences: Vec<PredictionEntry>,
    pub recommended_method: Option<String>,
    pub confidence_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// One line of the consultation transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}
