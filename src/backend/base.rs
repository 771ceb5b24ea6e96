use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::events::Subscription;
use super::memory::{MemoryBackend, MemoryBackendConfig};
use super::rest::{RestBackend, RestBackendConfig};
use crate::models::{Identity, NewProfile, Profile};

/// Errors reported by the hosted identity and profile services.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The service understood the request and refused it. The message is
    /// meant for the end user.
    #[error("{0}")]
    Rejected(String),
    /// The request never got a usable answer.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Extra fields attached to a new account.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignUpMetadata {
    pub first_name: String,
    pub last_name: String,
}

/// Result of a successful sign-up. `identity` is absent when the service
/// created the account without opening a session (e.g. the email still
/// needs confirming).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub subject_id: String,
    pub email: String,
    pub identity: Option<Identity>,
}

/// Credential-based identity service with a change-notification stream.
#[async_trait]
pub trait IdentityService: Send + Sync {
    fn get_name(&self) -> &str;
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, BackendError>;
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpOutcome, BackendError>;
    async fn sign_out(&self) -> Result<(), BackendError>;
    async fn reset_password_for_email(&self, email: &str) -> Result<(), BackendError>;
    /// Point-in-time view of the persisted session, if any.
    async fn get_session(&self) -> Option<Identity>;
    fn subscribe(&self) -> Subscription;
}

/// Record store holding the profile fields the identity service lacks.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find(&self, subject_id: &str) -> Result<Option<Profile>, BackendError>;
    async fn insert(&self, profile: &NewProfile) -> Result<(), BackendError>;
}

/// Backend selection, tagged by `type` in the YAML.
#[derive(Deserialize, Serialize, Debug, JsonSchema)]
#[serde(tag = "type")]
pub enum BackendConfig {
    #[serde(rename = "memory")]
    Memory(MemoryBackendConfig),
    #[serde(rename = "rest")]
    Rest(RestBackendConfig),
}

/// The pair of services the session controller talks to.
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityService>,
    pub profiles: Arc<dyn ProfileStore>,
}

/// Creates the identity service and profile store described by the config.
pub fn create_backend(config: &BackendConfig) -> Result<Backend, String> {
    match config {
        BackendConfig::Memory(cfg) => {
            let backend = MemoryBackend::new(cfg)?;
            info!(
                backend_type = "memory",
                accounts = cfg.users.len(),
                "created in-memory backend"
            );
            Ok(Backend {
                identity: Arc::new(backend.identity),
                profiles: Arc::new(backend.profiles),
            })
        }
        BackendConfig::Rest(cfg) => {
            let backend = RestBackend::new(cfg)?;
            info!(backend_type = "rest", url = cfg.url.as_str(), "created REST backend");
            Ok(Backend {
                identity: Arc::new(backend.identity),
                profiles: Arc::new(backend.profiles),
            })
        }
    }
}
