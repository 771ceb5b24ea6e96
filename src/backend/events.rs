use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::Identity;

const EVENT_BUFFER: usize = 64;

/// What happened to the remote session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// A change notification: the kind of change plus the identity as it stands
/// afterwards (absent when signed out).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub identity: Option<Identity>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, identity: Option<Identity>) -> Self {
        AuthEvent { kind, identity }
    }
}

/// One item read from a [`Subscription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Changed(AuthEvent),
    /// The consumer fell behind and this many events were dropped.
    Lagged(u64),
}

/// Fan-out hub used by identity service implementations.
#[derive(Clone)]
pub struct AuthEvents {
    sender: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        AuthEvents { sender }
    }

    pub fn emit(&self, event: AuthEvent) {
        let kind = event.kind;
        if self.sender.send(event).is_err() {
            debug!(?kind, "auth event dropped, nobody is subscribed");
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: Some(self.sender.subscribe()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// A cancellable stream of auth change notifications.
///
/// Unsubscribing is idempotent and also happens on drop.
pub struct Subscription {
    receiver: Option<broadcast::Receiver<AuthEvent>>,
}

impl Subscription {
    /// Waits for the next notification. Returns `None` once unsubscribed or
    /// once the identity service has gone away.
    pub async fn next(&mut self) -> Option<Notification> {
        let receiver = self.receiver.as_mut()?;
        match receiver.recv().await {
            Ok(event) => Some(Notification::Changed(event)),
            Err(broadcast::error::RecvError::Lagged(missed)) => Some(Notification::Lagged(missed)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Releases the subscription. Returns `true` only on the first call.
    pub fn unsubscribe(&mut self) -> bool {
        match self.receiver.take() {
            Some(_) => {
                debug!("auth subscription released");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_receives_events() {
        let events = AuthEvents::new();
        let mut sub = events.subscribe();
        events.emit(AuthEvent::new(AuthEventKind::SignedOut, None));

        let received = sub.next().await;
        assert_eq!(
            received,
            Some(Notification::Changed(AuthEvent::new(
                AuthEventKind::SignedOut,
                None
            )))
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let events = AuthEvents::new();
        let mut sub = events.subscribe();
        assert_eq!(events.subscriber_count(), 1);

        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert!(!sub.is_active());
        assert_eq!(events.subscriber_count(), 0);
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let events = AuthEvents::new();
        {
            let _sub = events.subscribe();
            assert_eq!(events.subscriber_count(), 1);
        }
        assert_eq!(events.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_told() {
        let events = AuthEvents::new();
        let mut sub = events.subscribe();
        for _ in 0..(EVENT_BUFFER + 3) {
            events.emit(AuthEvent::new(AuthEventKind::TokenRefreshed, None));
        }
        assert_eq!(sub.next().await, Some(Notification::Lagged(3)));
    }

    #[tokio::test]
    async fn test_closed_hub_ends_stream() {
        let events = AuthEvents::new();
        let mut sub = events.subscribe();
        drop(events);
        assert_eq!(sub.next().await, None);
    }
}
