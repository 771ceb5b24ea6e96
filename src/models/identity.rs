use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The credential bundle attached to an authenticated identity.
///
/// Never inspected by the session layer; it is only carried along so that
/// data requests can be made on behalf of the signed-in user.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionTokens {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

// Tokens are credentials, keep them out of logs.
impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// An identity record as handed out by the identity service.
///
/// Replaced wholesale whenever the service reports a change.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub tokens: SessionTokens,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: impl Into<String>, tokens: SessionTokens) -> Self {
        Identity {
            id: id.into(),
            email: email.into(),
            tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_debug_redacts_tokens() {
        let tokens = SessionTokens {
            access_token: "secret-access".to_string(),
            refresh_token: "secret-refresh".to_string(),
            expires_at: None,
        };
        let identity = Identity::new("u1", "a@x.com", tokens);
        let rendered = format!("{:?}", identity);
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("a@x.com"));
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let tokens = SessionTokens {
            expires_at: Some(now - Duration::seconds(1)),
            ..Default::default()
        };
        assert!(tokens.is_expired(now));
        assert!(!SessionTokens::default().is_expired(now));
    }
}
