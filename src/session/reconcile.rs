use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::state::SessionState;
use crate::backend::ProfileStore;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{Identity, User};

/// How a reconciliation resolved the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Anonymous,
    FullProfile,
    /// Authenticated, but the profile row was missing or unreadable.
    DegradedProfile,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Anonymous => "anonymous",
            ReconcileOutcome::FullProfile => "full_profile",
            ReconcileOutcome::DegradedProfile => "degraded_profile",
        }
    }
}

/// Builds the merged user for an identity. Lookup failures degrade to a
/// user without profile fields instead of failing.
pub async fn resolve_user(
    profiles: &dyn ProfileStore,
    identity: Option<Identity>,
) -> (Option<(Identity, User)>, ReconcileOutcome) {
    let Some(identity) = identity else {
        return (None, ReconcileOutcome::Anonymous);
    };

    match profiles.find(&identity.id).await {
        Ok(Some(profile)) => {
            let user = User::merge(&identity, &profile);
            (Some((identity, user)), ReconcileOutcome::FullProfile)
        }
        Ok(None) => {
            debug!(
                event_name = "session.reconcile.profile_missing",
                event_domain = "session",
                subject_id = identity.id.as_str(),
                "no profile row, using identity only"
            );
            let user = User::from_identity(&identity);
            (Some((identity, user)), ReconcileOutcome::DegradedProfile)
        }
        Err(e) => {
            warn!(
                event_name = "session.reconcile.profile_lookup_failed",
                event_domain = "session",
                subject_id = identity.id.as_str(),
                error = %e,
                "profile lookup failed, using identity only"
            );
            let user = User::from_identity(&identity);
            (Some((identity, user)), ReconcileOutcome::DegradedProfile)
        }
    }
}

/// The single writer of [`SessionState`].
pub struct Reconciler {
    profiles: Arc<dyn ProfileStore>,
    state: watch::Sender<SessionState>,
    metrics: Metrics,
}

impl Reconciler {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        state: watch::Sender<SessionState>,
        metrics: Metrics,
    ) -> Self {
        Reconciler {
            profiles,
            state,
            metrics,
        }
    }

    /// Brings the session state in line with `identity`. The new state is
    /// published in one step; readers are only woken when it differs.
    pub async fn reconcile(&self, identity: Option<Identity>) -> ReconcileOutcome {
        let (resolved, outcome) = resolve_user(self.profiles.as_ref(), identity).await;
        let subject_id = resolved.as_ref().map(|(identity, _)| identity.id.clone());

        let changed = self.state.send_if_modified(|state| state.apply(resolved));
        self.metrics.record_reconciliation(outcome.as_str());

        if changed {
            info!(
                event_name = "session.reconcile.applied",
                event_domain = "session",
                outcome = outcome.as_str(),
                subject_id = subject_id.as_deref().unwrap_or(""),
                "session state updated"
            );
        } else {
            debug!(
                event_name = "session.reconcile.unchanged",
                event_domain = "session",
                outcome = outcome.as_str(),
                "session state already up to date"
            );
        }
        outcome
    }
}
