pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod flow;
pub mod models;
pub mod normalizer;
pub mod parser;
pub mod runner;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use auth::{AuthSession, AuthStatus, AuthStore, FileAuthStore, InMemoryAuthStore};
pub use client::{ConsultationApi, HttpApiClient, RecommendationReply};
pub use config::ClientConfig;
pub use error::{FlowError, Result};
pub use flow::{ConsultationFlow, ExecutionResult, ExecutionStatus};
pub use models::{FeedbackData, PatientInfo, PlantRecord, PredictionEntry, Recommendation};
pub use runner::FlowRunner;
pub use session::{ConsultationSession, InMemorySessionStorage, SessionStorage};
pub use state::{ConsultationState, FeedbackStep};
