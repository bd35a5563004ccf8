use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FlowError, Result};

/// One timeout for every outbound call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Time the thank-you message stays up before a new consultation starts
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(3);

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Paths of the service endpoints, relative to `base_url`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub recommend: String,
    pub feedback: String,
    pub login: String,
    pub register: String,
    pub verify_role: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            recommend: "/rag/chat".to_string(),
            feedback: "/feedback".to_string(),
            login: "/api/login".to_string(),
            register: "/api/register".to_string(),
            verify_role: "/api/verify-role".to_string(),
        }
    }
}

/// Client configuration: defaults, then an optional YAML file, then the environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    #[serde(with = "duration_millis")]
    pub reset_delay: Duration,
    pub auth_file: PathBuf,
    pub endpoints: Endpoints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reset_delay: DEFAULT_RESET_DELAY,
            auth_file: default_auth_file(),
            endpoints: Endpoints::default(),
        }
    }
}

impl ClientConfig {
    /// Loads `PLANT_CONSULT_CONFIG` when set and applies environment overrides
    pub fn load() -> Result<Self> {
        let config = match std::env::var("PLANT_CONSULT_CONFIG") {
            Ok(path) => Self::from_yaml_file(path)?,
            Err(_) => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FlowError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "Loaded configuration file");
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)
            .map_err(|e| FlowError::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()
    }

    /// Applies `PLANT_API_URL`, `PLANT_API_TIMEOUT_SECS`, `PLANT_RESET_DELAY_MS`
    /// and `PLANT_AUTH_FILE` as read through `lookup`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PLANT_API_URL") {
            self.base_url = url;
        }
        if let Some(secs) = lookup("PLANT_API_TIMEOUT_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|_| {
                FlowError::Config(format!("PLANT_API_TIMEOUT_SECS is not a number: {secs}"))
            })?;
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(millis) = lookup("PLANT_RESET_DELAY_MS") {
            let millis = millis.trim().parse::<u64>().map_err(|_| {
                FlowError::Config(format!("PLANT_RESET_DELAY_MS is not a number: {millis}"))
            })?;
            self.reset_delay = Duration::from_millis(millis);
        }
        if let Some(path) = lookup("PLANT_AUTH_FILE") {
            self.auth_file = PathBuf::from(path);
        }
        self.validate()
    }

    /// A zero timeout would fail every request before it is sent
    fn validate(self) -> Result<Self> {
        if self.request_timeout.is_zero() {
            return Err(FlowError::Config(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn default_auth_file() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".plant-consult")
        .join("auth.json")
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
