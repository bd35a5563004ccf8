use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{FeedbackData, PatientInfo, Recommendation, TranscriptEntry},
    state::ConsultationState,
};

/// Everything one consultation owns. Passed explicitly into every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationSession {
    /// Storage key, stable for the lifetime of the chat
    pub id: String,
    /// Id sent to the service; replaced on every new consultation
    pub consultation_id: String,
    pub user_id: Option<String>,
    pub state: ConsultationState,
    pub patient: PatientInfo,
    pub feedback: FeedbackData,
    pub selected_plant: Option<String>,
    pub last_recommendation: Option<Recommendation>,
    pub transcript: Vec<TranscriptEntry>,
}

impl ConsultationSession {
    pub fn new(user_id: Option<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), user_id)
    }

    pub fn with_id(id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            consultation_id: Uuid::new_v4().to_string(),
            user_id,
            state: ConsultationState::initial(),
            patient: PatientInfo::default(),
            feedback: FeedbackData::default(),
            selected_plant: None,
            last_recommendation: None,
            transcript: Vec::new(),
        }
    }

    /// Starts over: collected answers are dropped, the transcript is kept
    pub fn reset(&mut self) {
        self.consultation_id = Uuid::new_v4().to_string();
        self.state = ConsultationState::initial();
        self.patient = PatientInfo::default();
        self.feedback = FeedbackData::default();
        self.selected_plant = None;
        self.last_recommendation = None;
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.transcript.push(entry);
    }

    pub fn last_message(&self) -> Option<&TranscriptEntry> {
        self.transcript.last()
    }
}

/// Trait for storing and retrieving consultation sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: ConsultationSession) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<ConsultationSession>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
#[derive(Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, ConsultationSession>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: ConsultationSession) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ConsultationSession>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TranscriptEntry;
    use crate::state::FeedbackStep;

    #[tokio::test]
    async fn storage_round_trip() {
        let storage = InMemorySessionStorage::new();
        let session = ConsultationSession::with_id("session1", Some("ana".to_string()));
        storage.save(session).await.unwrap();

        let retrieved = storage.get("session1").await.unwrap().unwrap();
        assert_eq!(retrieved.user_id.as_deref(), Some("ana"));
        assert_eq!(retrieved.state, ConsultationState::AwaitingSymptoms);

        storage.delete("session1").await.unwrap();
        assert!(storage.get("session1").await.unwrap().is_none());
    }

    #[test]
    fn reset_clears_answers_but_keeps_transcript() {
        let mut session = ConsultationSession::new(None);
        let first_consultation = session.consultation_id.clone();
        session.patient.symptoms = Some("dolor de cabeza".to_string());
        session.feedback.effectiveness = Some(4);
        session.selected_plant = Some("Muña".to_string());
        session.state = ConsultationState::AwaitingFeedback(FeedbackStep::ThankYou);
        session.push(TranscriptEntry::user("hola"));

        session.reset();

        assert_eq!(session.state, ConsultationState::AwaitingSymptoms);
        assert_eq!(session.patient, PatientInfo::default());
        assert_eq!(session.feedback, FeedbackData::default());
        assert!(session.selected_plant.is_none());
        assert_ne!(session.consultation_id, first_consultation);
        assert_eq!(session.transcript.len(), 1);
    }
}
