use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::lock::Mutex;
use reqwest::{RequestBuilder, Response};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::base::{BackendError, IdentityService, ProfileStore, SignUpMetadata, SignUpOutcome};
use super::events::{AuthEvent, AuthEventKind, AuthEvents, Subscription};
use crate::models::{Identity, NewProfile, Profile, SessionTokens};

/// The config needed to talk to a hosted auth + REST data service.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct RestBackendConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Project base URL, e.g. `https://project.example.co`.
    pub url: String,
    /// Public API key sent with every request.
    pub anon_key: String,
    #[serde(default = "default_profiles_table")]
    pub profiles_table: String,
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
}

fn default_name() -> String {
    "rest".to_string()
}

fn default_profiles_table() -> String {
    "users".to_string()
}

fn default_timeout_in_ms() -> u64 {
    10_000
}

/// Shared HTTP plumbing plus the locally persisted session.
struct RestClient {
    config: RestBackendConfig,
    http: reqwest::Client,
    current: Mutex<Option<Identity>>,
}

impl RestClient {
    fn base(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base(), path)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base(), table)
    }

    /// Token used for data requests: the user's access token when signed in,
    /// the anon key otherwise.
    async fn bearer(&self) -> String {
        match self.current.lock().await.as_ref() {
            Some(identity) => identity.tokens.access_token.clone(),
            None => self.config.anon_key.clone(),
        }
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", &self.config.anon_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = self
            .with_key(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("Error sending request: {}", e)))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }
}

/// Client errors carry a message meant for the user; anything else is a
/// transport failure.
async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body).ok().and_then(|v| {
        ["error_description", "msg", "message", "error"]
            .iter()
            .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
    });

    if status.is_client_error() {
        BackendError::Rejected(message.unwrap_or_else(|| format!("Request failed: {}", status)))
    } else {
        BackendError::Transport(format!(
            "Unexpected status code: {} ({})",
            status,
            message.unwrap_or(body)
        ))
    }
}

#[derive(Deserialize, Debug)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_identity(self, fallback_email: &str) -> Identity {
        let expires_at: Option<DateTime<Utc>> = match (self.expires_at, self.expires_in) {
            (Some(at), _) => DateTime::from_timestamp(at, 0),
            // Out-of-range lifetimes leave the expiry unknown.
            (None, Some(secs)) => chrono::TimeDelta::try_seconds(secs)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl)),
            (None, None) => None,
        };
        Identity::new(
            self.user.id,
            self.user.email.unwrap_or_else(|| fallback_email.to_string()),
            SessionTokens {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
                expires_at,
            },
        )
    }
}

#[derive(Deserialize, Debug)]
struct ProfileRow {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

fn decode_error(e: impl std::fmt::Display) -> BackendError {
    BackendError::Transport(format!("Error parsing JSON: {}", e))
}

/// Identity service backed by the hosted auth API.
pub struct RestIdentityService {
    client: Arc<RestClient>,
    events: AuthEvents,
}

/// Profile store backed by the hosted REST data API.
pub struct RestProfileStore {
    client: Arc<RestClient>,
}

/// Both halves of the REST backend, sharing one HTTP client and session.
pub struct RestBackend {
    pub identity: RestIdentityService,
    pub profiles: RestProfileStore,
}

impl RestBackend {
    pub fn new(config: &RestBackendConfig) -> Result<Self, String> {
        info!(
            "Creating REST backend '{}' for '{}'",
            config.name, config.url
        );
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_in_ms))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        let client = Arc::new(RestClient {
            config: config.clone(),
            http,
            current: Mutex::new(None),
        });
        Ok(RestBackend {
            identity: RestIdentityService {
                client: client.clone(),
                events: AuthEvents::new(),
            },
            profiles: RestProfileStore { client },
        })
    }
}

impl RestIdentityService {
    async fn open_session(&self, identity: &Identity) {
        *self.client.current.lock().await = Some(identity.clone());
        self.events
            .emit(AuthEvent::new(AuthEventKind::SignedIn, Some(identity.clone())));
    }
}

#[async_trait]
impl IdentityService for RestIdentityService {
    fn get_name(&self) -> &str {
        &self.client.config.name
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, BackendError> {
        let url = self.client.auth_url("token?grant_type=password");
        debug!("Sending sign-in request to: {}", url);
        let response = self
            .client
            .send(
                self.client
                    .http
                    .post(&url)
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        let identity = response
            .json::<TokenResponse>()
            .await
            .map_err(decode_error)?
            .into_identity(email);

        self.open_session(&identity).await;
        Ok(identity)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpOutcome, BackendError> {
        let url = self.client.auth_url("signup");
        debug!("Sending sign-up request to: {}", url);
        let response = self
            .client
            .send(self.client.http.post(&url).json(&json!({
                "email": email,
                "password": password,
                "data": metadata,
            })))
            .await?;
        let body = response.json::<Value>().await.map_err(decode_error)?;

        // With email confirmation enabled the service answers with the bare
        // user and no session.
        if body.get("access_token").is_some() {
            let identity = serde_json::from_value::<TokenResponse>(body)
                .map_err(decode_error)?
                .into_identity(email);
            self.open_session(&identity).await;
            return Ok(SignUpOutcome {
                subject_id: identity.id.clone(),
                email: identity.email.clone(),
                identity: Some(identity),
            });
        }

        let user_value = body.get("user").cloned().unwrap_or(body);
        let user = serde_json::from_value::<AuthUser>(user_value).map_err(decode_error)?;
        info!(
            backend_name = self.get_name(),
            "account created, confirmation pending"
        );
        Ok(SignUpOutcome {
            subject_id: user.id,
            email: user.email.unwrap_or_else(|| email.to_string()),
            identity: None,
        })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let current = self.client.current.lock().await.take();
        let result = match current {
            Some(identity) => {
                let url = self.client.auth_url("logout");
                self.client
                    .send(
                        self.client
                            .http
                            .post(&url)
                            .bearer_auth(&identity.tokens.access_token),
                    )
                    .await
                    .map(|_| ())
            }
            None => Ok(()),
        };
        if let Err(e) = &result {
            warn!("Remote sign-out failed, local session cleared anyway: {}", e);
        }
        self.events
            .emit(AuthEvent::new(AuthEventKind::SignedOut, None));
        result
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<(), BackendError> {
        let url = self.client.auth_url("recover");
        self.client
            .send(self.client.http.post(&url).json(&json!({ "email": email })))
            .await
            .map(|_| ())
    }

    async fn get_session(&self) -> Option<Identity> {
        self.client.current.lock().await.clone()
    }

    fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    async fn find(&self, subject_id: &str) -> Result<Option<Profile>, BackendError> {
        let url = self.client.table_url(&self.client.config.profiles_table);
        let bearer = self.client.bearer().await;
        let filter = format!("eq.{}", subject_id);
        let response = self
            .client
            .send(
                self.client
                    .http
                    .get(&url)
                    .query(&[
                        ("id", filter.as_str()),
                        ("select", "id,email,first_name,last_name"),
                    ])
                    .bearer_auth(bearer),
            )
            .await?;
        let rows = response
            .json::<Vec<ProfileRow>>()
            .await
            .map_err(decode_error)?;

        Ok(rows.into_iter().next().map(|row| Profile {
            id: row.id,
            email: row.email.unwrap_or_default(),
            first_name: row.first_name,
            last_name: row.last_name,
        }))
    }

    async fn insert(&self, profile: &NewProfile) -> Result<(), BackendError> {
        let url = self.client.table_url(&self.client.config.profiles_table);
        let bearer = self.client.bearer().await;
        self.client
            .send(
                self.client
                    .http
                    .post(&url)
                    .bearer_auth(bearer)
                    .header("Prefer", "return=minimal")
                    .json(profile),
            )
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Notification;
    use mockito::{Matcher, Server};

    fn config(url: String) -> RestBackendConfig {
        RestBackendConfig {
            name: "test-rest".to_string(),
            url,
            anon_key: "anon".to_string(),
            profiles_table: "users".to_string(),
            timeout_in_ms: 2000,
        }
    }

    const TOKEN_BODY: &str = r#"{
        "access_token": "access-1",
        "refresh_token": "refresh-1",
        "expires_in": 3600,
        "user": {"id": "u1", "email": "a@x.com"}
    }"#;

    /// Test that a successful sign-in stores the session and notifies subscribers.
    #[tokio::test]
    async fn test_sign_in_success() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/v1/token?grant_type=password")
            .match_header("apikey", "anon")
            .match_body(Matcher::Json(
                json!({"email": "a@x.com", "password": "pw"}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_BODY)
            .create_async()
            .await;

        let backend = RestBackend::new(&config(server.url())).unwrap();
        let mut sub = backend.identity.subscribe();
        let identity = backend
            .identity
            .sign_in_with_password("a@x.com", "pw")
            .await
            .unwrap();
        m.assert_async().await;

        assert_eq!(identity.id, "u1");
        assert_eq!(identity.tokens.access_token, "access-1");
        assert!(identity.tokens.expires_at.is_some());
        assert_eq!(backend.identity.get_session().await, Some(identity.clone()));
        assert_eq!(
            sub.next().await,
            Some(Notification::Changed(AuthEvent::new(
                AuthEventKind::SignedIn,
                Some(identity)
            )))
        );
    }

    /// Test that an absurd token lifetime leaves the expiry unknown.
    #[tokio::test]
    async fn test_sign_in_with_out_of_range_lifetime() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/v1/token?grant_type=password")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token": "access-1", "expires_in": 1000000000000000,
                    "user": {"id": "u1", "email": "a@x.com"}}"#,
            )
            .create_async()
            .await;

        let backend = RestBackend::new(&config(server.url())).unwrap();
        let identity = backend
            .identity
            .sign_in_with_password("a@x.com", "pw")
            .await
            .unwrap();
        m.assert_async().await;

        assert_eq!(identity.id, "u1");
        assert_eq!(identity.tokens.expires_at, None);
    }

    /// Test that a 400 answer is surfaced as a rejection with the service's message.
    #[tokio::test]
    async fn test_sign_in_rejected() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/v1/token?grant_type=password")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
            .create_async()
            .await;

        let backend = RestBackend::new(&config(server.url())).unwrap();
        let result = backend
            .identity
            .sign_in_with_password("a@x.com", "bad")
            .await;
        m.assert_async().await;
        assert_eq!(
            result,
            Err(BackendError::Rejected("Invalid login credentials".to_string()))
        );
        assert_eq!(backend.identity.get_session().await, None);
    }

    /// Test that server errors are not shown to the user verbatim.
    #[tokio::test]
    async fn test_server_error_is_transport() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/auth/v1/recover")
            .with_status(503)
            .with_body("upstream down")
            .create_async()
            .await;

        let backend = RestBackend::new(&config(server.url())).unwrap();
        let result = backend.identity.reset_password_for_email("a@x.com").await;
        assert!(matches!(result, Err(BackendError::Transport(_))));
    }

    /// Test that an unreachable service is reported as a transport error.
    #[tokio::test]
    async fn test_unreachable_service() {
        let backend = RestBackend::new(&config("http://127.0.0.1:9".to_string())).unwrap();
        let result = backend.identity.sign_in_with_password("a@x.com", "pw").await;
        assert!(matches!(result, Err(BackendError::Transport(_))));
    }

    /// Test sign-up when the service asks for email confirmation first.
    #[tokio::test]
    async fn test_sign_up_without_session() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/v1/signup")
            .match_body(Matcher::PartialJson(json!({
                "email": "new@x.com",
                "data": {"first_name": "Jo", "last_name": "Lee"}
            })))
            .with_status(200)
            .with_body(r#"{"id": "u9", "email": "new@x.com"}"#)
            .create_async()
            .await;

        let backend = RestBackend::new(&config(server.url())).unwrap();
        let outcome = backend
            .identity
            .sign_up(
                "new@x.com",
                "password",
                &SignUpMetadata {
                    first_name: "Jo".to_string(),
                    last_name: "Lee".to_string(),
                },
            )
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(outcome.subject_id, "u9");
        assert_eq!(outcome.identity, None);
        assert_eq!(backend.identity.get_session().await, None);
    }

    /// Test sign-up with auto-confirmation: a session is opened right away.
    #[tokio::test]
    async fn test_sign_up_with_session() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/auth/v1/signup")
            .with_status(200)
            .with_body(TOKEN_BODY)
            .create_async()
            .await;

        let backend = RestBackend::new(&config(server.url())).unwrap();
        let outcome = backend
            .identity
            .sign_up(
                "a@x.com",
                "password",
                &SignUpMetadata {
                    first_name: "Jo".to_string(),
                    last_name: "Lee".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.subject_id, "u1");
        assert!(outcome.identity.is_some());
        assert!(backend.identity.get_session().await.is_some());
    }

    /// Test that sign-out clears the local session even when the remote call fails.
    #[tokio::test]
    async fn test_sign_out_clears_local_session_on_failure() {
        let mut server = Server::new_async().await;
        let _login = server
            .mock("POST", "/auth/v1/token?grant_type=password")
            .with_status(200)
            .with_body(TOKEN_BODY)
            .create_async()
            .await;
        let logout = server
            .mock("POST", "/auth/v1/logout")
            .match_header("authorization", "Bearer access-1")
            .with_status(500)
            .create_async()
            .await;

        let backend = RestBackend::new(&config(server.url())).unwrap();
        backend
            .identity
            .sign_in_with_password("a@x.com", "pw")
            .await
            .unwrap();
        let mut sub = backend.identity.subscribe();

        let result = backend.identity.sign_out().await;
        logout.assert_async().await;
        assert!(result.is_err());
        assert_eq!(backend.identity.get_session().await, None);
        assert_eq!(
            sub.next().await,
            Some(Notification::Changed(AuthEvent::new(
                AuthEventKind::SignedOut,
                None
            )))
        );
    }

    /// Test profile lookup with and without a matching row.
    #[tokio::test]
    async fn test_profile_find() {
        let mut server = Server::new_async().await;
        let found = server
            .mock("GET", "/rest/v1/users")
            .match_query(profile_query("eq.u1"))
            .match_header("authorization", "Bearer anon")
            .with_status(200)
            .with_body(r#"[{"id":"u1","email":"a@x.com","first_name":"Jo","last_name":"Lee"}]"#)
            .create_async()
            .await;
        let missing = server
            .mock("GET", "/rest/v1/users")
            .match_query(profile_query("eq.u2"))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let backend = RestBackend::new(&config(server.url())).unwrap();
        let profile = backend.profiles.find("u1").await.unwrap().unwrap();
        assert_eq!(profile.first_name.as_deref(), Some("Jo"));
        assert_eq!(profile.last_name.as_deref(), Some("Lee"));
        assert_eq!(backend.profiles.find("u2").await.unwrap(), None);
        found.assert_async().await;
        missing.assert_async().await;
    }

    fn profile_query(filter: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("id".into(), filter.into()),
            Matcher::UrlEncoded("select".into(), "id,email,first_name,last_name".into()),
        ])
    }

    /// Test that reserved characters in a subject id stay inside the id filter.
    #[tokio::test]
    async fn test_profile_find_encodes_subject_id() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/rest/v1/users")
            .match_query(profile_query("eq.u1&select=*,secret"))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let backend = RestBackend::new(&config(server.url())).unwrap();
        let profile = backend.profiles.find("u1&select=*,secret").await.unwrap();
        m.assert_async().await;
        assert_eq!(profile, None);
    }

    /// Test that profile inserts send the row and use the signed-in user's token.
    #[tokio::test]
    async fn test_profile_insert_uses_session_token() {
        let mut server = Server::new_async().await;
        let _login = server
            .mock("POST", "/auth/v1/token?grant_type=password")
            .with_status(200)
            .with_body(TOKEN_BODY)
            .create_async()
            .await;
        let insert = server
            .mock("POST", "/rest/v1/users")
            .match_header("authorization", "Bearer access-1")
            .match_header("prefer", "return=minimal")
            .match_body(Matcher::Json(json!({
                "id": "u1",
                "email": "a@x.com",
                "first_name": "Jo",
                "last_name": "Lee"
            })))
            .with_status(201)
            .create_async()
            .await;

        let backend = RestBackend::new(&config(server.url())).unwrap();
        backend
            .identity
            .sign_in_with_password("a@x.com", "pw")
            .await
            .unwrap();
        backend
            .profiles
            .insert(&NewProfile {
                id: "u1".to_string(),
                email: "a@x.com".to_string(),
                first_name: "Jo".to_string(),
                last_name: "Lee".to_string(),
            })
            .await
            .unwrap();
        insert.assert_async().await;
    }

    /// Test that a refused insert carries the service's message.
    #[tokio::test]
    async fn test_profile_insert_rejected() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/rest/v1/users")
            .with_status(409)
            .with_body(r#"{"message":"duplicate key value violates unique constraint"}"#)
            .create_async()
            .await;

        let backend = RestBackend::new(&config(server.url())).unwrap();
        let result = backend
            .profiles
            .insert(&NewProfile {
                id: "u1".to_string(),
                email: "a@x.com".to_string(),
                first_name: "Jo".to_string(),
                last_name: "Lee".to_string(),
            })
            .await;
        assert_eq!(
            result,
            Err(BackendError::Rejected(
                "duplicate key value violates unique constraint".to_string()
            ))
        );
    }
}
