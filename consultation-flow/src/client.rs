use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    config::ClientConfig,
    error::{FlowError, Result},
    models::Recommendation,
    normalizer::normalize_optional,
    parser::{extract_confidences, extract_plants},
};

/// Patient block of a recommendation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientPayload {
    pub symptoms: String,
    pub duration: String,
    pub allergies: String,
    pub user_id: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub patient_info: PatientPayload,
    pub session_id: String,
    /// `None` asks for recommendations, `Some` for the preparation of that plant
    pub selected_plant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub session_id: String,
    pub effectiveness_rating: u8,
    pub side_effects: String,
    pub improvement_time: String,
    pub additional_comments: String,
}

/// Richer reply shape carrying the model predictions separately from the text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedReply {
    /// Absent and `null` both decode to `None`
    #[serde(default)]
    pub rna_predictions: Option<Value>,
    #[serde(default)]
    pub rag_response: String,
    pub confidence_score: Option<f64>,
    pub recommended_method: Option<String>,
    #[serde(default)]
    pub logs: Value,
    pub error: Option<String>,
    pub session_id: Option<String>,
}

/// The two success shapes the recommendation endpoint answers with
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationReply {
    Answer {
        answer: String,
        session_id: Option<String>,
    },
    Detailed(DetailedReply),
}

impl RecommendationReply {
    /// Decodes a JSON body, rejecting anything that matches neither shape
    pub fn from_value(value: Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(FlowError::UnrecognizedFormat(format!(
                "expected an object, got {}",
                value
            )));
        };

        if let Some(answer) = object.get("answer").and_then(Value::as_str) {
            return Ok(RecommendationReply::Answer {
                answer: answer.to_string(),
                session_id: object
                    .get("session_id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }

        if object.contains_key("rag_response") || object.contains_key("rna_predictions") {
            return serde_json::from_value::<DetailedReply>(value)
                .map(RecommendationReply::Detailed)
                .map_err(|e| FlowError::UnrecognizedFormat(e.to_string()));
        }

        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        Err(FlowError::UnrecognizedFormat(format!(
            "no answer or rag_response field (keys: {})",
            keys.join(", ")
        )))
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            RecommendationReply::Answer { session_id, .. } => session_id.as_deref(),
            RecommendationReply::Detailed(reply) => reply.session_id.as_deref(),
        }
    }

    /// Parses plants out of the text and resolves confidences. Structured
    /// predictions win; the answer text is the fallback.
    pub fn into_recommendation(self) -> Recommendation {
        match self {
            RecommendationReply::Answer { answer, .. } => Recommendation {
                plants: extract_plants(&answer),
                confidences: extract_confidences(&answer),
                answer,
                recommended_method: None,
                confidence_score: None,
            },
            RecommendationReply::Detailed(reply) => {
                let mut confidences = normalize_optional(reply.rna_predictions.as_ref());
                if confidences.is_empty() {
                    confidences = extract_confidences(&reply.rag_response);
                }
                Recommendation {
                    plants: extract_plants(&reply.rag_response),
                    confidences,
                    answer: reply.rag_response,
                    recommended_method: reply.recommended_method,
                    confidence_score: reply.confidence_score,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub username: String,
}

/// Sign-up form as the service expects it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub dni: String,
    pub phone_number: String,
    pub age: u32,
    pub gender: String,
    pub weight: f64,
    pub height: f64,
    pub zone: String,
    pub occupation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RoleResponse {
    role: String,
}

/// Outbound calls the consultation flow depends on
#[async_trait]
pub trait ConsultationApi: Send + Sync {
    async fn recommend(&self, request: &RecommendationRequest) -> Result<RecommendationReply>;

    async fn submit_feedback(&self, request: &FeedbackRequest) -> Result<()>;
}

/// reqwest-backed client for the recommendation service
#[derive(Clone)]
pub struct HttpApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    token: Option<String>,
}

impl HttpApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FlowError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            config,
            token: None,
        })
    }

    /// Sends `Authorization: Bearer <token>` on every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse> {
        info!(identifier = %identifier, "Logging in");
        let body = LoginRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        };
        let value = self
            .send(self.http.post(self.config.url(&self.config.endpoints.login)).json(&body))
            .await?;
        decode_as(value)
    }

    pub async fn register(&self, registration: &Registration) -> Result<Value> {
        info!(username = %registration.username, "Registering user");
        self.send(
            self.http
                .post(self.config.url(&self.config.endpoints.register))
                .json(registration),
        )
        .await
    }

    /// Asks the service which role the current token carries
    pub async fn verify_role(&self) -> Result<String> {
        if self.token.is_none() {
            return Err(FlowError::Auth("no session token".to_string()));
        }
        let value = self
            .send(self.http.get(self.config.url(&self.config.endpoints.verify_role)))
            .await?;
        decode_as::<RoleResponse>(value).map(|r| r.role)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value> {
        let builder = match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let raw = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!(status = %status, bytes = raw.len(), "Received response");

        if !status.is_success() {
            let err = error_from_status(status, &raw);
            warn!(status = %status, error = %err, "Request rejected by service");
            return Err(err);
        }

        serde_json::from_str(&raw).map_err(|e| {
            error!(error = %e, "Response body is not JSON");
            FlowError::Parse {
                message: e.to_string(),
                raw,
            }
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> FlowError {
        if e.is_timeout() {
            FlowError::Timeout(self.config.request_timeout)
        } else {
            FlowError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl ConsultationApi for HttpApiClient {
    async fn recommend(&self, request: &RecommendationRequest) -> Result<RecommendationReply> {
        info!(
            session_id = %request.session_id,
            selected_plant = ?request.selected_plant,
            "Requesting recommendation"
        );
        let value = self
            .send(
                self.http
                    .post(self.config.url(&self.config.endpoints.recommend))
                    .json(request),
            )
            .await?;

        let reply = RecommendationReply::from_value(value)?;
        if let RecommendationReply::Detailed(DetailedReply {
            error: Some(message),
            ..
        }) = &reply
        {
            if !message.is_empty() {
                return Err(FlowError::Service {
                    status: StatusCode::OK.as_u16(),
                    message: message.clone(),
                });
            }
        }
        Ok(reply)
    }

    async fn submit_feedback(&self, request: &FeedbackRequest) -> Result<()> {
        info!(
            session_id = %request.session_id,
            rating = request.effectiveness_rating,
            "Submitting feedback"
        );
        self.send(
            self.http
                .post(self.config.url(&self.config.endpoints.feedback))
                .json(request),
        )
        .await?;
        Ok(())
    }
}

/// Builds the error for a non-2xx answer: `detail`, then `error`, then the status line
pub fn error_from_status(status: StatusCode, raw: &str) -> FlowError {
    let body: Option<Value> = serde_json::from_str(raw).ok();
    let field = |key: &str| {
        body.as_ref()
            .and_then(|b| b.get(key))
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    };
    let message = field("detail")
        .or_else(|| field("error"))
        .unwrap_or_else(|| format!("HTTP {}", status));

    if status == StatusCode::UNAUTHORIZED {
        FlowError::Auth(message)
    } else {
        FlowError::Service {
            status: status.as_u16(),
            message,
        }
    }
}

fn decode_as<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| FlowError::UnrecognizedFormat(e.to_string()))
}
