use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    client::{ConsultationApi, FeedbackRequest, RecommendationReply, RecommendationRequest},
    error::Result,
};

pub(crate) const DEFAULT_ANSWER: &str = "PLANTA_1: Manzanilla | Digestiva | Efectividad: Alta";

/// Holds a request open until the test releases it
#[derive(Default)]
pub(crate) struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Test double answering from scripted queues and recording every call
#[derive(Default)]
pub(crate) struct ScriptedApi {
    replies: Mutex<VecDeque<Result<RecommendationReply>>>,
    feedback_results: Mutex<VecDeque<Result<()>>>,
    recommend_calls: Mutex<Vec<RecommendationRequest>>,
    feedback_calls: Mutex<Vec<FeedbackRequest>>,
    gate: Option<Gate>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Gate::default()),
            ..Self::default()
        }
    }

    pub fn gate(&self) -> &Gate {
        self.gate.as_ref().expect("api was not built with a gate")
    }

    pub fn push_reply(&self, reply: Result<RecommendationReply>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_feedback_result(&self, result: Result<()>) {
        self.feedback_results.lock().unwrap().push_back(result);
    }

    pub fn recommend_calls(&self) -> Vec<RecommendationRequest> {
        self.recommend_calls.lock().unwrap().clone()
    }

    pub fn feedback_calls(&self) -> Vec<FeedbackRequest> {
        self.feedback_calls.lock().unwrap().clone()
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

#[async_trait]
impl ConsultationApi for ScriptedApi {
    async fn recommend(&self, request: &RecommendationRequest) -> Result<RecommendationReply> {
        self.recommend_calls.lock().unwrap().push(request.clone());
        self.pass_gate().await;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(RecommendationReply::Answer {
                    answer: DEFAULT_ANSWER.to_string(),
                    session_id: None,
                })
            })
    }

    async fn submit_feedback(&self, request: &FeedbackRequest) -> Result<()> {
        self.feedback_calls.lock().unwrap().push(request.clone());
        self.pass_gate().await;
        self.feedback_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}
