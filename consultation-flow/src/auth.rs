//! Persisted login session and its verification against the service.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    client::{HttpApiClient, LoginResponse},
    error::{FlowError, Result},
};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub username: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// The one stored shape of a login: bearer token plus who it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: UserIdentity,
}

impl AuthSession {
    pub fn from_login(login: LoginResponse) -> Self {
        Self {
            token: login.access_token,
            user: UserIdentity {
                username: login.username,
                role: None,
            },
        }
    }

    pub fn is_admin(&self) -> bool {
        self.user.role.as_deref() == Some(ADMIN_ROLE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Authenticated(AuthSession),
    Anonymous,
}

/// Trait for keeping the login session between runs
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn load(&self) -> Result<Option<AuthSession>>;
    async fn save(&self, session: &AuthSession) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// JSON file on disk, parent directories created on save
pub struct FileAuthStore {
    path: PathBuf,
}

impl FileAuthStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AuthStore for FileAuthStore {
    async fn load(&self) -> Result<Option<AuthSession>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(&self.path, e)),
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                // an unreadable file is treated as logged out
                warn!(path = %self.path.display(), error = %e, "Discarding unreadable auth file");
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &AuthSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(parent, e))?;
        }
        let raw = serde_json::to_string_pretty(session)
            .map_err(|e| FlowError::Storage(format!("Failed to encode auth session: {}", e)))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| storage_error(&self.path, e))
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> FlowError {
    FlowError::Storage(format!("{}: {}", path.display(), e))
}

#[derive(Default)]
pub struct InMemoryAuthStore {
    session: Mutex<Option<AuthSession>>,
}

impl InMemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStore for InMemoryAuthStore {
    async fn load(&self) -> Result<Option<AuthSession>> {
        Ok(self.lock()?.clone())
    }

    async fn save(&self, session: &AuthSession) -> Result<()> {
        *self.lock()? = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

impl InMemoryAuthStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<AuthSession>>> {
        self.session
            .lock()
            .map_err(|_| FlowError::Storage("auth store lock poisoned".to_string()))
    }
}

/// Checks the stored session with the service.
///
/// A rejected token clears the store. When the service cannot be reached the
/// stored session is kept as it is and its role stays unverified.
pub async fn resolve_auth(store: &dyn AuthStore, client: &HttpApiClient) -> Result<AuthStatus> {
    let Some(mut session) = store.load().await? else {
        return Ok(AuthStatus::Anonymous);
    };

    match client.clone().with_token(&session.token).verify_role().await {
        Ok(role) => {
            info!(username = %session.user.username, role = %role, "Session verified");
            if session.user.role.as_deref() != Some(role.as_str()) {
                session.user.role = Some(role);
                store.save(&session).await?;
            }
            Ok(AuthStatus::Authenticated(session))
        }
        Err(FlowError::Auth(reason)) => {
            warn!(username = %session.user.username, reason = %reason, "Stored session rejected, logging out");
            store.clear().await?;
            Ok(AuthStatus::Anonymous)
        }
        Err(e) => {
            warn!(username = %session.user.username, error = %e, "Could not verify session, keeping it");
            Ok(AuthStatus::Authenticated(session))
        }
    }
}

/// Logs in and stores the resulting session
pub async fn login(
    store: &dyn AuthStore,
    client: &HttpApiClient,
    identifier: &str,
    password: &str,
) -> Result<AuthSession> {
    let session = AuthSession::from_login(client.login(identifier, password).await?);
    store.save(&session).await?;
    info!(username = %session.user.username, "Logged in");
    Ok(session)
}

pub async fn logout(store: &dyn AuthStore) -> Result<()> {
    store.clear().await?;
    info!("Logged out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use std::time::Duration;

    fn session(role: Option<&str>) -> AuthSession {
        AuthSession {
            token: "tok-123".to_string(),
            user: UserIdentity {
                username: "ana".to_string(),
                role: role.map(str::to_string),
            },
        }
    }

    fn unreachable_client() -> HttpApiClient {
        let config = ClientConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            request_timeout: Duration::from_secs(2),
            ..ClientConfig::default()
        };
        HttpApiClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn file_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuthStore::new(dir.path().join("nested").join("auth.json"));

        assert_eq!(store.load().await.unwrap(), None);
        store.save(&session(Some("user"))).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(session(Some("user"))));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        // clearing twice is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileAuthStore::new(path);
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn nothing_stored_is_anonymous() {
        let store = InMemoryAuthStore::new();
        let status = resolve_auth(&store, &unreachable_client()).await.unwrap();
        assert_eq!(status, AuthStatus::Anonymous);
    }

    #[tokio::test]
    async fn unreachable_service_keeps_session() {
        let store = InMemoryAuthStore::new();
        store.save(&session(None)).await.unwrap();

        let status = resolve_auth(&store, &unreachable_client()).await.unwrap();
        assert_eq!(status, AuthStatus::Authenticated(session(None)));
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn logout_clears_store() {
        let store = InMemoryAuthStore::new();
        store.save(&session(Some("admin"))).await.unwrap();
        assert!(store.load().await.unwrap().unwrap().is_admin());

        logout(&store).await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
