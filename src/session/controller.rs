//! The session controller.
//!
//! Owns the session state, keeps it in line with the identity service's
//! change notifications and exposes the account commands used by screens.

use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use futures::lock::Mutex;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::SessionError;
use super::reconcile::Reconciler;
use super::state::SessionState;
use crate::backend::{
    BackendError, IdentityService, Notification, ProfileStore, SignUpMetadata, Subscription,
};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{Identity, NewProfile};

/// Handle to the running session controller.
///
/// Cheap to share behind an `Arc`. Dropping it aborts the background task,
/// which releases the notification subscription.
pub struct SessionController {
    identity: Arc<dyn IdentityService>,
    profiles: Arc<dyn ProfileStore>,
    state: watch::Receiver<SessionState>,
    shutdown: watch::Sender<bool>,
    refresh: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
    metrics: Metrics,
}

impl SessionController {
    /// Subscribes to identity changes and starts reconciling in the
    /// background. Must be called from within a Tokio runtime.
    pub fn start(
        identity: Arc<dyn IdentityService>,
        profiles: Arc<dyn ProfileStore>,
        metrics: Metrics,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let refresh = Arc::new(Notify::new());

        // Subscribe before anything else so no change can slip by.
        let subscription = identity.subscribe();
        let reconciler = Reconciler::new(profiles.clone(), state_tx, metrics.clone());

        info!(
            identity_service = identity.get_name(),
            "starting session controller"
        );
        let task = tokio::spawn(run(
            identity.clone(),
            reconciler,
            subscription,
            refresh.clone(),
            shutdown_rx,
        ));

        SessionController {
            identity,
            profiles,
            state: state_rx,
            shutdown: shutdown_tx,
            refresh,
            task: Mutex::new(Some(task)),
            metrics,
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// A receiver that is notified on every state change.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Waits for the first reconciliation and returns the state at that
    /// point. Returns the current state if the controller already stopped.
    pub async fn wait_ready(&self) -> SessionState {
        let mut rx = self.state.clone();
        if rx.wait_for(|state| state.ready()).await.is_err() {
            debug!("session controller stopped before the first reconciliation");
        }
        let state = rx.borrow().clone();
        state
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let started = Instant::now();
        let result = match self.identity.sign_in_with_password(email, password).await {
            Ok(_) => Ok(()),
            Err(BackendError::Rejected(message)) => Err(SessionError::Rejected(message)),
            Err(BackendError::Transport(e)) => {
                warn!(
                    event_name = "session.login.failed",
                    event_domain = "session",
                    error = e.as_str(),
                    "login did not reach the identity service"
                );
                Err(SessionError::LoginFailed)
            }
        };
        self.record("login", &result, started);
        result
    }

    /// Creates the account, then its profile row. A failed profile write
    /// leaves the account in place.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), SessionError> {
        let started = Instant::now();
        let result = self
            .create_account(email, password, first_name, last_name)
            .await;
        self.record("signup", &result, started);
        result
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), SessionError> {
        let metadata = SignUpMetadata {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        let outcome = match self.identity.sign_up(email, password, &metadata).await {
            Ok(outcome) => outcome,
            Err(BackendError::Rejected(message)) => return Err(SessionError::Rejected(message)),
            Err(BackendError::Transport(e)) => {
                warn!(
                    event_name = "session.signup.failed",
                    event_domain = "session",
                    error = e.as_str(),
                    "signup did not reach the identity service"
                );
                return Err(SessionError::SignupFailed);
            }
        };

        let profile = NewProfile {
            id: outcome.subject_id.clone(),
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        if let Err(e) = self.profiles.insert(&profile).await {
            warn!(
                event_name = "session.signup.profile_failed",
                event_domain = "session",
                subject_id = outcome.subject_id.as_str(),
                error = %e,
                "account created but profile row was not written"
            );
            return Err(SessionError::ProfileCreationFailed);
        }
        if outcome.identity.is_some() {
            // The sign-in notification may have been reconciled before the
            // row existed.
            self.refresh.notify_one();
        }

        info!(
            event_name = "session.signup.created",
            event_domain = "session",
            subject_id = outcome.subject_id.as_str(),
            session_open = outcome.identity.is_some(),
            "account and profile created"
        );
        Ok(())
    }

    /// Ends the remote session. Failures are logged, never returned.
    pub async fn logout(&self) {
        let started = Instant::now();
        let label = match self.identity.sign_out().await {
            Ok(()) => "success",
            Err(e) => {
                warn!(
                    event_name = "session.logout.failed",
                    event_domain = "session",
                    error = %e,
                    "sign-out reported an error"
                );
                "failure"
            }
        };
        self.metrics.record_command("logout", label);
        self.metrics
            .record_command_duration("logout", started.elapsed().as_secs_f64());
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), SessionError> {
        let started = Instant::now();
        let result = match self.identity.reset_password_for_email(email).await {
            Ok(()) => Ok(()),
            Err(BackendError::Rejected(message)) => Err(SessionError::Rejected(message)),
            Err(BackendError::Transport(e)) => {
                warn!(
                    event_name = "session.forgot_password.failed",
                    event_domain = "session",
                    error = e.as_str(),
                    "password reset did not reach the identity service"
                );
                Err(SessionError::PasswordResetFailed)
            }
        };
        self.record("forgot_password", &result, started);
        result
    }

    /// Stops reconciling and releases the subscription. Safe to call more
    /// than once.
    pub async fn shutdown(&self) {
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            let _ = self.shutdown.send(true);
            if let Err(e) = task.await {
                warn!("session task ended abnormally: {}", e);
            }
            info!("session controller stopped");
        }
    }

    fn record(&self, command: &str, result: &Result<(), SessionError>, started: Instant) {
        let label = match result {
            Ok(()) => "success",
            Err(e) if e.is_rejection() => "rejected",
            Err(_) => "failure",
        };
        self.metrics.record_command(command, label);
        self.metrics
            .record_command_duration(command, started.elapsed().as_secs_f64());
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

/// Background loop: the initial session query runs alongside the
/// notification stream. A notification handled before the query returns
/// supersedes it.
async fn run(
    identity: Arc<dyn IdentityService>,
    reconciler: Reconciler,
    mut subscription: Subscription,
    refresh: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) {
    let query = identity.clone();
    let mut initial: Option<BoxFuture<'static, Option<Identity>>> =
        Some(async move { query.get_session().await }.boxed());

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            current = async {
                match initial.as_mut() {
                    Some(query) => query.await,
                    None => std::future::pending().await,
                }
            }, if initial.is_some() =>
            {
                initial = None;
                debug!("initial session query returned");
                reconciler.reconcile(current).await;
            }

            _ = refresh.notified() => {
                initial = None;
                debug!("session refresh requested");
                let current = identity.get_session().await;
                reconciler.reconcile(current).await;
            }

            notification = subscription.next() => match notification {
                Some(Notification::Changed(event)) => {
                    initial = None;
                    debug!(kind = ?event.kind, "auth change received");
                    reconciler.reconcile(event.identity).await;
                }
                Some(Notification::Lagged(missed)) => {
                    initial = None;
                    warn!(missed, "auth notifications dropped, re-reading session");
                    let current = identity.get_session().await;
                    reconciler.reconcile(current).await;
                }
                None => {
                    debug!("auth notification stream closed");
                    break;
                }
            },
        }
    }

    subscription.unsubscribe();
}
