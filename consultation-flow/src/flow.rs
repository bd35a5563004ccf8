use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    client::{ConsultationApi, FeedbackRequest, PatientPayload, RecommendationRequest},
    error::{FlowError, Result},
    models::{NO_ALLERGIES, TranscriptEntry},
    session::ConsultationSession,
    state::{ConsultationState, FeedbackStep},
};

/// Minimum number of characters accepted as a symptom description
pub const MIN_SYMPTOM_CHARS: usize = 3;

pub mod prompts {
    pub const SYMPTOMS: &str =
        "Hola, soy tu asistente de plantas medicinales. ¿Qué síntomas presentas?";
    pub const DURATION: &str = "¿Desde hace cuánto tiempo tienes estos síntomas?";
    pub const ALLERGIES: &str =
        "¿Tienes alguna alergia? Si no tienes ninguna, deja la respuesta en blanco.";
    pub const PLANT_SELECTION: &str =
        "Escribe el nombre o el número de la planta para recibir su preparación detallada.";
    pub const EFFECTIVENESS: &str =
        "Cuando hayas probado el tratamiento, ¿qué tan efectivo fue? Responde del 1 al 5.";
    pub const SIDE_EFFECTS: &str = "¿Notaste algún efecto secundario?";
    pub const IMPROVEMENT_TIME: &str = "¿Cuánto tiempo tardaste en notar una mejora?";
    pub const COMMENTS: &str = "¿Algún comentario adicional?";
    pub const THANK_YOU: &str =
        "¡Gracias por tu opinión! En unos segundos comenzará una nueva consulta.";
    pub const IDLE: &str = "No hay una consulta activa. Inicia una nueva consulta.";
    pub const SESSION_EXPIRED: &str = "Tu sesión expiró. Vuelve a iniciar sesión.";
    pub const REQUEST_FAILED: &str = "No se pudo completar la solicitud";
}

/// Question shown while the flow sits in `state`
pub fn prompt_for(state: ConsultationState) -> &'static str {
    match state {
        ConsultationState::AwaitingSymptoms => prompts::SYMPTOMS,
        ConsultationState::AwaitingDuration => prompts::DURATION,
        ConsultationState::AwaitingAllergies => prompts::ALLERGIES,
        ConsultationState::AwaitingPlantSelection => prompts::PLANT_SELECTION,
        ConsultationState::AwaitingFeedback(step) => match step {
            FeedbackStep::Effectiveness => prompts::EFFECTIVENESS,
            FeedbackStep::SideEffects => prompts::SIDE_EFFECTS,
            FeedbackStep::ImprovementTime => prompts::IMPROVEMENT_TIME,
            FeedbackStep::Comments => prompts::COMMENTS,
            FeedbackStep::ThankYou => prompts::THANK_YOU,
        },
        ConsultationState::Idle => prompts::IDLE,
    }
}

/// Outbound call a transition asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    Recommend,
    SubmitFeedback,
}

/// Status of one submitted answer
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionStatus {
    /// Answer accepted, waiting for the next one
    WaitingForInput,
    /// Answer rejected locally, same question asked again
    Rejected,
    /// Outbound request failed; nothing changed and the answer can be resent
    Failed(String),
    /// Service refused the session; caller must log the user out
    AuthRequired(String),
    /// Feedback stored, consultation over until the reset
    Completed,
    /// Another answer for this session is still being processed
    Busy,
    /// No active consultation
    Inactive,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: ExecutionStatus,
    pub state: ConsultationState,
}

/// Validates `input` against the current state and commits exactly one field,
/// advancing the state. Returns the outbound call the answer triggers.
/// On error nothing in `session` is touched.
pub fn apply_input(session: &mut ConsultationSession, input: &str) -> Result<Effect> {
    let previous = session.state;
    commit_answer(session, input)?;
    Ok(effect_of_leaving(previous))
}

/// Outbound call owed when a state is left with a valid answer
fn effect_of_leaving(state: ConsultationState) -> Effect {
    match state {
        _ if !state.requires_request() => Effect::None,
        ConsultationState::AwaitingFeedback(FeedbackStep::Comments) => Effect::SubmitFeedback,
        _ => Effect::Recommend,
    }
}

fn commit_answer(session: &mut ConsultationSession, input: &str) -> Result<()> {
    match session.state {
        ConsultationState::AwaitingSymptoms => {
            if input.trim().chars().count() < MIN_SYMPTOM_CHARS {
                return Err(FlowError::Validation(format!(
                    "Describe tus síntomas con al menos {MIN_SYMPTOM_CHARS} caracteres."
                )));
            }
            session.patient.symptoms = Some(input.to_string());
            session.state = ConsultationState::AwaitingDuration;
            Ok(())
        }
        ConsultationState::AwaitingDuration => {
            if input.trim().is_empty() {
                return Err(FlowError::Validation(
                    "Indica la duración de los síntomas.".to_string(),
                ));
            }
            session.patient.duration = Some(input.to_string());
            session.state = ConsultationState::AwaitingAllergies;
            Ok(())
        }
        ConsultationState::AwaitingAllergies => {
            let allergies = match input.trim() {
                "" => NO_ALLERGIES.to_string(),
                answer => answer.to_lowercase(),
            };
            session.patient.allergies = Some(allergies);
            session.selected_plant = None;
            session.state = ConsultationState::AwaitingPlantSelection;
            Ok(())
        }
        ConsultationState::AwaitingPlantSelection => {
            // the service reads an empty selection as a fresh consultation
            if input.trim().is_empty() {
                return Err(FlowError::Validation(
                    "Escribe el nombre o el número de una planta.".to_string(),
                ));
            }
            session.selected_plant = Some(resolve_plant_selection(session, input));
            session.state = ConsultationState::AwaitingFeedback(FeedbackStep::Effectiveness);
            Ok(())
        }
        ConsultationState::AwaitingFeedback(step) => apply_feedback(session, step, input),
        ConsultationState::Idle => Err(FlowError::Validation(prompts::IDLE.to_string())),
    }
}

fn apply_feedback(session: &mut ConsultationSession, step: FeedbackStep, input: &str) -> Result<()> {
    let answer = input.trim().to_string();
    match step {
        FeedbackStep::Effectiveness => {
            let rating = answer
                .parse::<u8>()
                .ok()
                .filter(|r| (1..=5).contains(r))
                .ok_or_else(|| {
                    FlowError::Validation("La efectividad debe ser un número del 1 al 5.".to_string())
                })?;
            session.feedback.effectiveness = Some(rating);
        }
        FeedbackStep::SideEffects => session.feedback.side_effects = Some(answer),
        FeedbackStep::ImprovementTime => session.feedback.time_to_improvement = Some(answer),
        FeedbackStep::Comments => session.feedback.additional_comments = Some(answer),
        FeedbackStep::ThankYou => {
            return Err(FlowError::Validation(prompts::THANK_YOU.to_string()));
        }
    }
    session.state = ConsultationState::AwaitingFeedback(step.next());
    Ok(())
}

/// A number picks from the last list of plants, anything else is taken as a name
fn resolve_plant_selection(session: &ConsultationSession, input: &str) -> String {
    let answer = input.trim();
    let by_index = answer.parse::<usize>().ok().and_then(|n| {
        let plants = &session.last_recommendation.as_ref()?.plants;
        plants.get(n.checked_sub(1)?)
    });
    match by_index {
        Some(plant) => plant.name.clone(),
        None => answer.to_string(),
    }
}

pub fn recommendation_request(session: &ConsultationSession) -> RecommendationRequest {
    RecommendationRequest {
        patient_info: PatientPayload {
            symptoms: session.patient.symptoms.clone().unwrap_or_default(),
            duration: session.patient.duration.clone().unwrap_or_default(),
            allergies: session.patient.allergies.clone().unwrap_or_default(),
            user_id: session.user_id.clone(),
            session_id: session.consultation_id.clone(),
        },
        session_id: session.consultation_id.clone(),
        selected_plant: session.selected_plant.clone(),
    }
}

pub fn feedback_request(session: &ConsultationSession) -> Result<FeedbackRequest> {
    let feedback = &session.feedback;
    let effectiveness_rating = feedback
        .effectiveness
        .ok_or_else(|| FlowError::Validation("Falta la calificación de efectividad.".to_string()))?;
    Ok(FeedbackRequest {
        session_id: session.consultation_id.clone(),
        effectiveness_rating,
        side_effects: feedback.side_effects.clone().unwrap_or_default(),
        improvement_time: feedback.time_to_improvement.clone().unwrap_or_default(),
        additional_comments: feedback.additional_comments.clone().unwrap_or_default(),
    })
}

/// Drives one consultation step at a time against the recommendation service
#[derive(Clone)]
pub struct ConsultationFlow {
    api: Arc<dyn ConsultationApi>,
}

impl ConsultationFlow {
    pub fn new(api: Arc<dyn ConsultationApi>) -> Self {
        Self { api }
    }

    /// Handles one user answer. Request failures are reported through the
    /// returned status and the transcript; only storage-level problems are `Err`.
    pub async fn execute_session(
        &self,
        session: &mut ConsultationSession,
        input: &str,
    ) -> Result<ExecutionResult> {
        match session.state {
            ConsultationState::AwaitingFeedback(FeedbackStep::ThankYou) => {
                return Ok(self.result(session, Some(prompts::THANK_YOU), ExecutionStatus::Completed));
            }
            ConsultationState::Idle => {
                return Ok(self.result(session, Some(prompts::IDLE), ExecutionStatus::Inactive));
            }
            _ => {}
        }

        let previous = session.state;
        let mut draft = session.clone();
        let effect = match apply_input(&mut draft, input) {
            Ok(effect) => effect,
            Err(FlowError::Validation(reason)) => {
                info!(session_id = %session.id, state = ?previous, reason = %reason, "Answer rejected");
                let reprompt = format!("{}\n{}", reason, prompt_for(previous));
                session.push(TranscriptEntry::user(input));
                session.push(TranscriptEntry::assistant(reprompt.clone()));
                return Ok(self.result(session, Some(reprompt.as_str()), ExecutionStatus::Rejected));
            }
            Err(e) => return Err(e),
        };

        draft.push(TranscriptEntry::user(input));
        let outcome = match effect {
            Effect::None => Ok(prompt_for(draft.state).to_string()),
            Effect::Recommend => self.recommend(&mut draft).await,
            Effect::SubmitFeedback => self.submit_feedback(&draft).await,
        };

        match outcome {
            Ok(response) => {
                info!(
                    session_id = %session.id,
                    from = ?previous,
                    to = ?draft.state,
                    "Consultation advanced"
                );
                draft.push(TranscriptEntry::assistant(response.clone()));
                *session = draft;
                let status = if session.state.is_terminal() {
                    ExecutionStatus::Completed
                } else {
                    ExecutionStatus::WaitingForInput
                };
                Ok(self.result(session, Some(response.as_str()), status))
            }
            Err(FlowError::Auth(reason)) => {
                warn!(session_id = %session.id, reason = %reason, "Session rejected by service");
                session.push(TranscriptEntry::user(input));
                session.push(TranscriptEntry::system(prompts::SESSION_EXPIRED));
                Ok(self.result(
                    session,
                    Some(prompts::SESSION_EXPIRED),
                    ExecutionStatus::AuthRequired(reason),
                ))
            }
            Err(e) if e.is_request_failure() => {
                error!(session_id = %session.id, state = ?previous, error = %e, "Request failed");
                let message = failure_message(&e);
                session.push(TranscriptEntry::user(input));
                session.push(TranscriptEntry::system(message.clone()));
                Ok(self.result(session, Some(message.as_str()), ExecutionStatus::Failed(e.to_string())))
            }
            Err(e) => Err(e),
        }
    }

    async fn recommend(&self, draft: &mut ConsultationSession) -> Result<String> {
        let request = recommendation_request(draft);
        let reply = self.api.recommend(&request).await?;

        if let Some(server_id) = reply.session_id() {
            if server_id != draft.consultation_id {
                info!(
                    local = %draft.consultation_id,
                    server = %server_id,
                    "Adopting consultation id from service"
                );
                draft.consultation_id = server_id.to_string();
            }
        }

        let recommendation = reply.into_recommendation();
        let answer = recommendation.answer.clone();
        info!(
            session_id = %draft.id,
            plants = recommendation.plants.len(),
            confidences = recommendation.confidences.len(),
            "Recommendation received"
        );
        if draft.selected_plant.is_none() {
            draft.last_recommendation = Some(recommendation);
        }

        Ok(format!("{}\n\n{}", answer, prompt_for(draft.state)))
    }

    async fn submit_feedback(&self, draft: &ConsultationSession) -> Result<String> {
        let request = feedback_request(draft)?;
        self.api.submit_feedback(&request).await?;
        Ok(prompts::THANK_YOU.to_string())
    }

    fn result(
        &self,
        session: &ConsultationSession,
        response: Option<&str>,
        status: ExecutionStatus,
    ) -> ExecutionResult {
        ExecutionResult {
            response: response.map(str::to_string),
            status,
            state: session.state,
        }
    }
}

fn failure_message(error: &FlowError) -> String {
    match error {
        FlowError::Parse { raw, .. } => {
            format!("{}. Respuesta recibida:\n{}", prompts::REQUEST_FAILED, raw)
        }
        other => format!("{}: {}", prompts::REQUEST_FAILED, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RecommendationReply;
    use crate::models::{FeedbackData, PatientInfo};
    use crate::testing::ScriptedApi;

    fn session_in(state: ConsultationState) -> ConsultationSession {
        let mut session = ConsultationSession::with_id("s1", Some("ana".to_string()));
        session.patient = PatientInfo {
            symptoms: Some("dolor de estómago".to_string()),
            duration: Some("2 días".to_string()),
            allergies: None,
        };
        session.state = state;
        session
    }

    #[test]
    fn valid_symptoms_are_stored_exactly() {
        for input in ["abc", "dolor de cabeza", "  tos seca  ", "náuseas"] {
            let mut session = ConsultationSession::new(None);
            assert_eq!(apply_input(&mut session, input).unwrap(), Effect::None);
            assert_eq!(session.state, ConsultationState::AwaitingDuration);
            assert_eq!(session.patient.symptoms.as_deref(), Some(input));
        }
    }

    #[test]
    fn short_symptoms_are_rejected() {
        for input in ["", "a", "ab", "   ", "  a", "ab   "] {
            let mut session = ConsultationSession::new(None);
            let err = apply_input(&mut session, input).unwrap_err();
            assert!(matches!(err, FlowError::Validation(_)));
            assert_eq!(session.state, ConsultationState::AwaitingSymptoms);
            assert!(session.patient.symptoms.is_none());
        }
    }

    #[test]
    fn blank_duration_is_rejected() {
        let mut session = session_in(ConsultationState::AwaitingDuration);
        session.patient.duration = None;
        assert!(apply_input(&mut session, "  ").is_err());
        assert_eq!(session.state, ConsultationState::AwaitingDuration);
        assert!(session.patient.duration.is_none());
    }

    #[test]
    fn allergies_default_and_lowercase() {
        let mut session = session_in(ConsultationState::AwaitingAllergies);
        assert_eq!(apply_input(&mut session, "").unwrap(), Effect::Recommend);
        assert_eq!(session.patient.allergies.as_deref(), Some(NO_ALLERGIES));

        let mut session = session_in(ConsultationState::AwaitingAllergies);
        apply_input(&mut session, "Penicilina").unwrap();
        assert_eq!(session.patient.allergies.as_deref(), Some("penicilina"));
        assert_eq!(session.state, ConsultationState::AwaitingPlantSelection);
    }

    #[test]
    fn effectiveness_must_be_one_to_five() {
        for bad in ["0", "6", "muy bien", "", "-1"] {
            let mut session =
                session_in(ConsultationState::AwaitingFeedback(FeedbackStep::Effectiveness));
            assert!(apply_input(&mut session, bad).is_err());
            assert_eq!(session.feedback, FeedbackData::default());
        }

        let mut session =
            session_in(ConsultationState::AwaitingFeedback(FeedbackStep::Effectiveness));
        apply_input(&mut session, "5").unwrap();
        assert_eq!(session.feedback.effectiveness, Some(5));
        assert_eq!(
            session.state,
            ConsultationState::AwaitingFeedback(FeedbackStep::SideEffects)
        );
    }

    #[test]
    fn plant_selection_by_number() {
        let mut session = session_in(ConsultationState::AwaitingPlantSelection);
        session.last_recommendation = Some(
            RecommendationReply::Answer {
                answer: "PLANTA_1: Muña | Digestiva\nPLANTA_2: Boldo | Hepático".to_string(),
                session_id: None,
            }
            .into_recommendation(),
        );
        apply_input(&mut session, "2").unwrap();
        assert_eq!(session.selected_plant.as_deref(), Some("Boldo"));

        let mut session = session_in(ConsultationState::AwaitingPlantSelection);
        apply_input(&mut session, "7").unwrap();
        assert_eq!(session.selected_plant.as_deref(), Some("7"));
    }

    #[test]
    fn blank_plant_selection_is_rejected() {
        for input in ["", "   ", "\t"] {
            let mut session = session_in(ConsultationState::AwaitingPlantSelection);
            assert!(matches!(
                apply_input(&mut session, input),
                Err(FlowError::Validation(_))
            ));
            assert_eq!(session.state, ConsultationState::AwaitingPlantSelection);
            assert!(session.selected_plant.is_none());
        }
    }

    #[test]
    fn only_request_states_trigger_calls() {
        let mut session = session_in(ConsultationState::AwaitingFeedback(FeedbackStep::SideEffects));
        assert_eq!(apply_input(&mut session, "ninguno").unwrap(), Effect::None);

        let mut session = session_in(ConsultationState::AwaitingFeedback(FeedbackStep::Comments));
        assert_eq!(apply_input(&mut session, "").unwrap(), Effect::SubmitFeedback);

        let mut session = session_in(ConsultationState::AwaitingPlantSelection);
        assert_eq!(apply_input(&mut session, "Muña").unwrap(), Effect::Recommend);
    }

    fn session_at_comments() -> ConsultationSession {
        let mut session = session_in(ConsultationState::AwaitingFeedback(FeedbackStep::Comments));
        session.patient.allergies = Some(NO_ALLERGIES.to_string());
        session.selected_plant = Some("Muña".to_string());
        session.feedback = FeedbackData {
            effectiveness: Some(4),
            side_effects: Some("ninguno".to_string()),
            time_to_improvement: Some("1 día".to_string()),
            additional_comments: None,
        };
        session
    }

    #[tokio::test]
    async fn blank_plant_selection_sends_nothing() {
        let api = Arc::new(ScriptedApi::new());
        let flow = ConsultationFlow::new(api.clone());
        let mut session = session_in(ConsultationState::AwaitingPlantSelection);

        let result = flow.execute_session(&mut session, "   ").await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Rejected);
        assert_eq!(session.state, ConsultationState::AwaitingPlantSelection);
        assert!(session.selected_plant.is_none());
        assert!(api.recommend_calls().is_empty());
    }

    #[tokio::test]
    async fn failed_feedback_keeps_comments_step() {
        let api = Arc::new(ScriptedApi::new());
        api.push_feedback_result(Err(FlowError::Network("down".to_string())));
        let flow = ConsultationFlow::new(api.clone());
        let mut session = session_at_comments();

        let result = flow.execute_session(&mut session, "muy buena").await.unwrap();

        assert!(matches!(result.status, ExecutionStatus::Failed(_)));
        assert_eq!(
            session.state,
            ConsultationState::AwaitingFeedback(FeedbackStep::Comments)
        );
        assert!(session.feedback.additional_comments.is_none());
        assert_eq!(api.feedback_calls().len(), 1);

        let result = flow.execute_session(&mut session, "muy buena").await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(
            session.state,
            ConsultationState::AwaitingFeedback(FeedbackStep::ThankYou)
        );
        assert_eq!(session.feedback.additional_comments.as_deref(), Some("muy buena"));
        assert_eq!(api.feedback_calls().len(), 2);
    }

    #[tokio::test]
    async fn rejected_feedback_requires_login() {
        let api = Arc::new(ScriptedApi::new());
        api.push_feedback_result(Err(FlowError::Auth("Token expirado".to_string())));
        let flow = ConsultationFlow::new(api.clone());
        let mut session = session_at_comments();

        let result = flow.execute_session(&mut session, "gracias").await.unwrap();

        assert!(matches!(result.status, ExecutionStatus::AuthRequired(ref r) if r == "Token expirado"));
        assert_eq!(
            session.state,
            ConsultationState::AwaitingFeedback(FeedbackStep::Comments)
        );
        assert!(session.feedback.additional_comments.is_none());
        assert_eq!(api.feedback_calls().len(), 1);
    }

    #[tokio::test]
    async fn allergies_trigger_exactly_one_recommendation() {
        let api = Arc::new(ScriptedApi::new());
        api.push_reply(Ok(RecommendationReply::Answer {
            answer: "PLANTA_1: Manzanilla | Alivia dolor | Efectividad: Alta".to_string(),
            session_id: Some("server-123".to_string()),
        }));
        let flow = ConsultationFlow::new(api.clone());
        let mut session = session_in(ConsultationState::AwaitingAllergies);

        let result = flow.execute_session(&mut session, "Ninguna").await.unwrap();

        assert_eq!(result.status, ExecutionStatus::WaitingForInput);
        assert_eq!(session.state, ConsultationState::AwaitingPlantSelection);
        assert_eq!(session.consultation_id, "server-123");
        let calls = api.recommend_calls();
        assert_eq!(calls.len(), 1);
        let request = &calls[0];
        assert_eq!(request.patient_info.allergies, "ninguna");
        assert_eq!(request.patient_info.user_id.as_deref(), Some("ana"));
        assert!(request.selected_plant.is_none());

        let recommendation = session.last_recommendation.as_ref().unwrap();
        assert_eq!(recommendation.plants[0].name, "Manzanilla");
        assert!(result.response.unwrap().contains("Manzanilla"));
    }

    #[tokio::test]
    async fn failed_request_keeps_state() {
        let api = Arc::new(ScriptedApi::new());
        api.push_reply(Err(FlowError::Network("connection refused".to_string())));
        let flow = ConsultationFlow::new(api.clone());
        let mut session = session_in(ConsultationState::AwaitingAllergies);

        let result = flow.execute_session(&mut session, "polen").await.unwrap();

        assert!(matches!(result.status, ExecutionStatus::Failed(_)));
        assert_eq!(session.state, ConsultationState::AwaitingAllergies);
        assert!(session.patient.allergies.is_none());
        let last = session.last_message().unwrap();
        assert!(last.content.starts_with(prompts::REQUEST_FAILED));

        // the same answer can be resent
        let result = flow.execute_session(&mut session, "polen").await.unwrap();
        assert_eq!(result.status, ExecutionStatus::WaitingForInput);
        assert_eq!(session.patient.allergies.as_deref(), Some("polen"));
        assert_eq!(api.recommend_calls().len(), 2);
    }

    #[tokio::test]
    async fn unauthorized_requires_login() {
        let api = Arc::new(ScriptedApi::new());
        api.push_reply(Err(FlowError::Auth("Invalid authentication credentials".to_string())));
        let flow = ConsultationFlow::new(api);
        let mut session = session_in(ConsultationState::AwaitingAllergies);

        let result = flow.execute_session(&mut session, "").await.unwrap();

        assert!(matches!(result.status, ExecutionStatus::AuthRequired(_)));
        assert_eq!(session.state, ConsultationState::AwaitingAllergies);
    }

    #[tokio::test]
    async fn parse_failures_show_the_raw_body() {
        let api = Arc::new(ScriptedApi::new());
        api.push_reply(Err(FlowError::Parse {
            message: "expected value".to_string(),
            raw: "<html>Bad Gateway</html>".to_string(),
        }));
        let flow = ConsultationFlow::new(api);
        let mut session = session_in(ConsultationState::AwaitingAllergies);

        let result = flow.execute_session(&mut session, "").await.unwrap();
        assert!(result.response.unwrap().contains("<html>Bad Gateway</html>"));
    }

    #[tokio::test]
    async fn full_consultation_reaches_thank_you() {
        let api = Arc::new(ScriptedApi::new());
        api.push_reply(Ok(RecommendationReply::Answer {
            answer: "PLANTA_1: Muña | Digestiva | Efectividad: Alta".to_string(),
            session_id: None,
        }));
        api.push_reply(Ok(RecommendationReply::Answer {
            answer: "Prepare una infusión de muña...".to_string(),
            session_id: None,
        }));
        let flow = ConsultationFlow::new(api.clone());
        let mut session = ConsultationSession::new(Some("ana".to_string()));

        let answers = [
            "dolor de estómago",
            "3 días",
            "",
            "1",
            "5",
            "ninguno",
            "2 días",
            "muy buena",
        ];
        let mut statuses = Vec::new();
        for answer in answers {
            statuses.push(flow.execute_session(&mut session, answer).await.unwrap().status);
        }

        assert!(statuses[..7]
            .iter()
            .all(|s| *s == ExecutionStatus::WaitingForInput));
        assert_eq!(statuses[7], ExecutionStatus::Completed);
        assert_eq!(
            session.state,
            ConsultationState::AwaitingFeedback(FeedbackStep::ThankYou)
        );

        let calls = api.recommend_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].selected_plant.as_deref(), Some("Muña"));

        let feedback = api.feedback_calls();
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback[0].effectiveness_rating, 5);
        assert_eq!(feedback[0].side_effects, "ninguno");
        assert_eq!(feedback[0].improvement_time, "2 días");
        assert_eq!(feedback[0].additional_comments, "muy buena");
        assert_eq!(feedback[0].session_id, session.consultation_id);

        // nothing is sent while the thank-you is up
        let result = flow.execute_session(&mut session, "hola").await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(api.feedback_calls().len(), 1);
    }

    #[tokio::test]
    async fn idle_sessions_do_nothing() {
        let api = Arc::new(ScriptedApi::new());
        let flow = ConsultationFlow::new(api.clone());
        let mut session = session_in(ConsultationState::Idle);

        let result = flow.execute_session(&mut session, "dolor").await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Inactive);
        assert_eq!(session.state, ConsultationState::Idle);
        assert!(api.recommend_calls().is_empty());
    }
}
