use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::lock::Mutex;
use jsonwebtoken::{EncodingKey, Header, encode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::base::{BackendError, IdentityService, ProfileStore, SignUpMetadata, SignUpOutcome};
use super::events::{AuthEvent, AuthEventKind, AuthEvents, Subscription};
use crate::models::{Identity, NewProfile, Profile, SessionTokens};

/// Config for the in-process backend.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct MemoryBackendConfig {
    /// A friendly name for logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// Accounts that exist at startup.
    #[serde(default)]
    pub users: Vec<MemoryUserEntry>,
    /// Email of an account whose session is already persisted at startup.
    #[serde(default)]
    pub signed_in_as: Option<String>,
    /// Secret used to sign access tokens.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,
}

/// A single pre-registered account.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct MemoryUserEntry {
    /// Fixed subject id; a random one is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Whether a profile row exists for this account.
    #[serde(default = "default_true")]
    pub profile: bool,
}

fn default_name() -> String {
    "memory".to_string()
}

fn default_jwt_secret() -> String {
    "sessiontron-memory-secret".to_string()
}

fn default_session_ttl_secs() -> i64 {
    3600
}

fn default_true() -> bool {
    true
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

struct Account {
    id: String,
    email: String,
    password: String,
    metadata: Option<SignUpMetadata>,
}

/// Mints a fresh session for the account: a signed access token plus an
/// opaque refresh token.
fn mint_identity(secret: &str, ttl: Duration, account: &Account) -> Result<Identity, String> {
    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        email: &'a str,
        aud: &'a str,
        role: &'a str,
        iat: i64,
        exp: i64,
    }

    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| "Session lifetime overflows the clock".to_string())?;
    let claims = Claims {
        sub: &account.id,
        email: &account.email,
        aud: "authenticated",
        role: "authenticated",
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };
    let access_token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| format!("Failed to encode access token: {}", e))?;

    Ok(Identity::new(
        account.id.clone(),
        account.email.clone(),
        SessionTokens {
            access_token,
            refresh_token: uuid::Uuid::new_v4().to_string(),
            expires_at: Some(expires_at),
        },
    ))
}

#[derive(Default)]
struct IdentityState {
    accounts: HashMap<String, Account>,
    current: Option<Identity>,
    reset_outbox: Vec<String>,
}

/// Identity service keeping accounts and the current session in memory.
pub struct MemoryIdentityService {
    name: String,
    jwt_secret: String,
    session_ttl: Duration,
    state: Mutex<IdentityState>,
    events: AuthEvents,
}

/// Profile store keeping rows in memory.
#[derive(Default)]
pub struct MemoryProfileStore {
    rows: Mutex<HashMap<String, Profile>>,
}

/// Both halves of the in-memory backend, seeded from the same config.
pub struct MemoryBackend {
    pub identity: MemoryIdentityService,
    pub profiles: MemoryProfileStore,
}

impl MemoryBackend {
    pub fn new(config: &MemoryBackendConfig) -> Result<Self, String> {
        let mut accounts = HashMap::new();
        let mut rows = HashMap::new();

        for entry in &config.users {
            let key = normalize_email(&entry.email);
            if key.is_empty() {
                return Err("memory backend user with empty email".to_string());
            }
            if accounts.contains_key(&key) {
                return Err(format!("duplicate memory backend user '{}'", entry.email));
            }
            let id = entry
                .id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            if entry.profile {
                rows.insert(
                    id.clone(),
                    Profile {
                        id: id.clone(),
                        email: entry.email.clone(),
                        first_name: entry.first_name.clone(),
                        last_name: entry.last_name.clone(),
                    },
                );
            }
            accounts.insert(
                key,
                Account {
                    id,
                    email: entry.email.clone(),
                    password: entry.password.clone(),
                    metadata: None,
                },
            );
        }

        let session_ttl = validate_session_ttl(config.session_ttl_secs)?;
        let current = match &config.signed_in_as {
            Some(email) => {
                let account = accounts
                    .get(&normalize_email(email))
                    .ok_or_else(|| format!("signed_in_as refers to unknown user '{}'", email))?;
                info!(
                    backend_name = config.name.as_str(),
                    "memory backend starts with a persisted session"
                );
                Some(mint_identity(&config.jwt_secret, session_ttl, account)?)
            }
            None => None,
        };

        let identity = MemoryIdentityService {
            name: config.name.clone(),
            jwt_secret: config.jwt_secret.clone(),
            session_ttl,
            state: Mutex::new(IdentityState {
                accounts,
                current,
                reset_outbox: Vec::new(),
            }),
            events: AuthEvents::new(),
        };

        Ok(MemoryBackend {
            identity,
            profiles: MemoryProfileStore {
                rows: Mutex::new(rows),
            },
        })
    }
}

fn validate_session_ttl(secs: i64) -> Result<Duration, String> {
    Duration::try_seconds(secs)
        .filter(|ttl| *ttl > Duration::zero())
        .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
        .ok_or_else(|| format!("session_ttl_secs {} is out of range", secs))
}

impl MemoryIdentityService {
    fn issue(&self, account: &Account) -> Result<Identity, String> {
        mint_identity(&self.jwt_secret, self.session_ttl, account)
    }

    /// Password reset emails "sent" so far, oldest first.
    pub async fn sent_reset_emails(&self) -> Vec<String> {
        self.state.lock().await.reset_outbox.clone()
    }

    /// Number of live change-notification subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }

    /// Metadata supplied when the account was created through sign-up.
    pub async fn signup_metadata(&self, email: &str) -> Option<SignUpMetadata> {
        let state = self.state.lock().await;
        state
            .accounts
            .get(&normalize_email(email))
            .and_then(|account| account.metadata.clone())
    }

    /// Rotates the tokens of the current session, as an auto-refresh would.
    pub async fn refresh_session(&self) -> Result<Identity, BackendError> {
        let mut state = self.state.lock().await;
        let current = state
            .current
            .clone()
            .ok_or_else(|| BackendError::Rejected("No active session".to_string()))?;
        let account = state
            .accounts
            .get(&normalize_email(&current.email))
            .ok_or_else(|| BackendError::Rejected("User not found".to_string()))?;
        let refreshed = self.issue(account).map_err(BackendError::Transport)?;
        state.current = Some(refreshed.clone());
        drop(state);

        self.events.emit(AuthEvent::new(
            AuthEventKind::TokenRefreshed,
            Some(refreshed.clone()),
        ));
        Ok(refreshed)
    }

    /// Drops the current session without a sign-out call, as happens when a
    /// refresh token is revoked remotely.
    pub async fn expire_session(&self) {
        let had_session = self.state.lock().await.current.take().is_some();
        if had_session {
            warn!(backend_name = self.name.as_str(), "session expired");
            self.events
                .emit(AuthEvent::new(AuthEventKind::SignedOut, None));
        }
    }
}

#[async_trait]
impl IdentityService for MemoryIdentityService {
    fn get_name(&self) -> &str {
        &self.name
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, BackendError> {
        let mut state = self.state.lock().await;
        let account = match state.accounts.get(&normalize_email(email)) {
            Some(account) if account.password == password => account,
            _ => {
                debug!(backend_name = self.name.as_str(), "sign-in rejected");
                return Err(BackendError::Rejected(
                    "Invalid login credentials".to_string(),
                ));
            }
        };
        let identity = self.issue(account).map_err(BackendError::Transport)?;
        state.current = Some(identity.clone());
        drop(state);

        self.events
            .emit(AuthEvent::new(AuthEventKind::SignedIn, Some(identity.clone())));
        Ok(identity)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpOutcome, BackendError> {
        let key = normalize_email(email);
        let mut state = self.state.lock().await;
        if state.accounts.contains_key(&key) {
            return Err(BackendError::Rejected("User already registered".to_string()));
        }

        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
            metadata: Some(metadata.clone()),
        };
        let identity = self.issue(&account).map_err(BackendError::Transport)?;
        let outcome = SignUpOutcome {
            subject_id: account.id.clone(),
            email: account.email.clone(),
            identity: Some(identity.clone()),
        };
        state.accounts.insert(key, account);
        state.current = Some(identity.clone());
        drop(state);

        info!(backend_name = self.name.as_str(), "account created");
        self.events
            .emit(AuthEvent::new(AuthEventKind::SignedIn, Some(identity)));
        Ok(outcome)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.state.lock().await.current = None;
        self.events
            .emit(AuthEvent::new(AuthEventKind::SignedOut, None));
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        // Unknown addresses are accepted silently so callers can't enumerate accounts.
        if state.accounts.contains_key(&normalize_email(email)) {
            state.reset_outbox.push(email.trim().to_string());
        }
        Ok(())
    }

    async fn get_session(&self) -> Option<Identity> {
        self.state.lock().await.current.clone()
    }

    fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find(&self, subject_id: &str) -> Result<Option<Profile>, BackendError> {
        Ok(self.rows.lock().await.get(subject_id).cloned())
    }

    async fn insert(&self, profile: &NewProfile) -> Result<(), BackendError> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&profile.id) {
            return Err(BackendError::Rejected(format!(
                "Profile '{}' already exists",
                profile.id
            )));
        }
        rows.insert(profile.id.clone(), profile.clone().into());
        Ok(())
    }
}
