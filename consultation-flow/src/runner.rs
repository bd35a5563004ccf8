//! FlowRunner – loads a consultation session, executes exactly **one** answer,
//! and persists the updated session back to storage.
//!
//! On top of the load → execute → save round-trip the runner owns two rules
//! that the bare [`ConsultationFlow`] cannot enforce on its own:
//!
//! * **One answer in flight per session.** A second submit for a session whose
//!   previous answer is still being processed (typically waiting on the
//!   recommendation service) returns [`ExecutionStatus::Busy`] and changes
//!   nothing, so double submits never produce duplicate requests.
//! * **Automatic restart.** Once feedback has been stored the thank-you stays
//!   up for `reset_delay`, then the session goes back to the first question.
//!
//! ```rust,ignore
//! let runner = FlowRunner::new(flow, storage, Duration::from_secs(3));
//! let session_id = runner.start(Some(user_id)).await?;
//! let result = runner.submit(&session_id, "dolor de cabeza").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tracing::{debug, info, warn};

use crate::{
    error::{FlowError, Result},
    flow::{ConsultationFlow, ExecutionResult, ExecutionStatus, prompt_for},
    models::TranscriptEntry,
    session::{ConsultationSession, SessionStorage},
};

/// How often the delayed reset retries while an answer is being processed
const RESET_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// High-level helper that orchestrates the common _load → execute → save_ pattern.
#[derive(Clone)]
pub struct FlowRunner {
    flow: Arc<ConsultationFlow>,
    storage: Arc<dyn SessionStorage>,
    in_flight: Arc<DashSet<String>>,
    reset_delay: Duration,
}

/// Marks a session busy for as long as it lives
struct InFlightGuard {
    in_flight: Arc<DashSet<String>>,
    session_id: String,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<DashSet<String>>, session_id: &str) -> Option<Self> {
        in_flight.insert(session_id.to_string()).then(|| Self {
            in_flight: in_flight.clone(),
            session_id: session_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.session_id);
    }
}

impl FlowRunner {
    pub fn new(
        flow: Arc<ConsultationFlow>,
        storage: Arc<dyn SessionStorage>,
        reset_delay: Duration,
    ) -> Self {
        Self {
            flow,
            storage,
            in_flight: Arc::new(DashSet::new()),
            reset_delay,
        }
    }

    /// Creates a session at the first question and returns its id
    pub async fn start(&self, user_id: Option<String>) -> Result<String> {
        let mut session = ConsultationSession::new(user_id);
        session.push(TranscriptEntry::assistant(prompt_for(session.state)));
        let session_id = session.id.clone();
        self.storage.save(session).await?;
        info!(session_id = %session_id, "Consultation session started");
        Ok(session_id)
    }

    /// Snapshot of the stored session
    pub async fn session(&self, session_id: &str) -> Result<ConsultationSession> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))
    }

    /// Execute **exactly one** answer for the given `session_id` and persist the
    /// updated session. Returns [`ExecutionStatus::Busy`] without touching
    /// anything when another answer for the same session is still running.
    pub async fn submit(&self, session_id: &str, input: &str) -> Result<ExecutionResult> {
        let Some(guard) = InFlightGuard::acquire(&self.in_flight, session_id) else {
            warn!(session_id = %session_id, "Answer ignored, previous one still in flight");
            let state = self.session(session_id).await?.state;
            return Ok(ExecutionResult {
                response: None,
                status: ExecutionStatus::Busy,
                state,
            });
        };

        // 1. Load session
        let mut session = self.session(session_id).await?;
        let was_terminal = session.state.is_terminal();

        // 2. Execute current step (exactly one answer)
        let result = self.flow.execute_session(&mut session, input).await?;

        // 3. Persist new state so the next call starts where we left off
        let consultation_id = session.consultation_id.clone();
        self.storage.save(session).await?;
        drop(guard);

        // only the answer that reached the thank-you owns the reset
        if !was_terminal && result.state.is_terminal() {
            self.schedule_reset(session_id, consultation_id);
        }
        Ok(result)
    }

    /// Starts a new consultation right away, whatever the current state
    pub async fn new_consultation(&self, session_id: &str) -> Result<ConsultationSession> {
        let _guard = self.wait_for_guard(session_id).await;
        let mut session = self.session(session_id).await?;
        session.reset();
        session.push(TranscriptEntry::assistant(prompt_for(session.state)));
        self.storage.save(session.clone()).await?;
        info!(session_id = %session_id, "New consultation started");
        Ok(session)
    }

    fn schedule_reset(&self, session_id: &str, consultation_id: String) {
        let runner = self.clone();
        let session_id = session_id.to_string();
        debug!(
            session_id = %session_id,
            consultation_id = %consultation_id,
            delay = ?self.reset_delay,
            "Scheduling consultation reset"
        );

        tokio::spawn(async move {
            tokio::time::sleep(runner.reset_delay).await;
            if let Err(e) = runner.reset_if_finished(&session_id, &consultation_id).await {
                warn!(session_id = %session_id, error = %e, "Consultation reset failed");
            }
        });
    }

    async fn reset_if_finished(&self, session_id: &str, consultation_id: &str) -> Result<()> {
        let _guard = self.wait_for_guard(session_id).await;
        let Some(mut session) = self.storage.get(session_id).await? else {
            return Ok(());
        };
        // a manual restart may already have started another consultation
        if session.consultation_id != consultation_id || !session.state.is_terminal() {
            debug!(session_id = %session_id, "Reset skipped, consultation already replaced");
            return Ok(());
        }
        session.reset();
        session.push(TranscriptEntry::assistant(prompt_for(session.state)));
        self.storage.save(session).await?;
        info!(session_id = %session_id, "Consultation reset after feedback");
        Ok(())
    }

    async fn wait_for_guard(&self, session_id: &str) -> InFlightGuard {
        loop {
            if let Some(guard) = InFlightGuard::acquire(&self.in_flight, session_id) {
                return guard;
            }
            tokio::time::sleep(RESET_RETRY_INTERVAL).await;
        }
    }
}
