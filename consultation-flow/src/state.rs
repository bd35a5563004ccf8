use serde::{Deserialize, Serialize};

/// Where a consultation currently stands. Exactly one is active per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsultationState {
    /// Waiting for the patient to describe their symptoms
    AwaitingSymptoms,
    /// Waiting for how long the symptoms have lasted
    AwaitingDuration,
    /// Waiting for known allergies; submitting asks for recommendations
    AwaitingAllergies,
    /// Recommendations shown, waiting for the patient to pick a plant
    AwaitingPlantSelection,
    /// Collecting treatment feedback, one question per step
    AwaitingFeedback(FeedbackStep),
    /// No active consultation
    Idle,
}

impl ConsultationState {
    pub fn initial() -> Self {
        ConsultationState::AwaitingSymptoms
    }

    /// States that only move forward through an outbound request
    pub fn requires_request(&self) -> bool {
        matches!(
            self,
            ConsultationState::AwaitingAllergies
                | ConsultationState::AwaitingPlantSelection
                | ConsultationState::AwaitingFeedback(FeedbackStep::Comments)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConsultationState::AwaitingFeedback(FeedbackStep::ThankYou)
        )
    }
}

impl Default for ConsultationState {
    fn default() -> Self {
        Self::initial()
    }
}

/// The four feedback questions plus the closing thank-you
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeedbackStep {
    Effectiveness,
    SideEffects,
    ImprovementTime,
    Comments,
    ThankYou,
}

impl FeedbackStep {
    /// Zero-based position, `ThankYou` being 4
    pub fn index(&self) -> u8 {
        match self {
            FeedbackStep::Effectiveness => 0,
            FeedbackStep::SideEffects => 1,
            FeedbackStep::ImprovementTime => 2,
            FeedbackStep::Comments => 3,
            FeedbackStep::ThankYou => 4,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(FeedbackStep::Effectiveness),
            1 => Some(FeedbackStep::SideEffects),
            2 => Some(FeedbackStep::ImprovementTime),
            3 => Some(FeedbackStep::Comments),
            4 => Some(FeedbackStep::ThankYou),
            _ => None,
        }
    }

    pub fn next(&self) -> Self {
        Self::from_index(self.index() + 1).unwrap_or(FeedbackStep::ThankYou)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_steps_advance_and_saturate() {
        assert_eq!(FeedbackStep::Effectiveness.next(), FeedbackStep::SideEffects);
        assert_eq!(FeedbackStep::Comments.next(), FeedbackStep::ThankYou);
        assert_eq!(FeedbackStep::ThankYou.next(), FeedbackStep::ThankYou);
        assert_eq!(FeedbackStep::from_index(5), None);
    }

    #[test]
    fn request_states() {
        assert!(ConsultationState::AwaitingAllergies.requires_request());
        assert!(!ConsultationState::AwaitingDuration.requires_request());
        assert!(ConsultationState::AwaitingFeedback(FeedbackStep::ThankYou).is_terminal());
        assert_eq!(ConsultationState::default(), ConsultationState::AwaitingSymptoms);
    }
}
