use serde::Serialize;

use crate::models::{Identity, User};

/// Where the session stands, derived from [`SessionState`].
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Uninitialized,
    Anonymous,
    Authenticated,
}

/// Which screen group consumers should show.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Nothing known yet; keep the splash/loading screen up.
    Loading,
    /// Login, signup and password reset screens.
    Auth,
    /// The storefront tabs.
    App,
}

/// The controller-owned session state.
///
/// `user` is present exactly when `identity` is; `ready` only ever goes
/// from false to true. Only the reconciliation routine writes it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    identity: Option<Identity>,
    user: Option<User>,
    ready: bool,
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn ready(&self) -> bool {
        self.ready
    }

    pub fn phase(&self) -> SessionPhase {
        match (self.ready, &self.user) {
            (false, _) => SessionPhase::Uninitialized,
            (true, None) => SessionPhase::Anonymous,
            (true, Some(_)) => SessionPhase::Authenticated,
        }
    }

    pub fn route(&self) -> Route {
        match self.phase() {
            SessionPhase::Uninitialized => Route::Loading,
            SessionPhase::Anonymous => Route::Auth,
            SessionPhase::Authenticated => Route::App,
        }
    }

    /// Replaces identity and user together and marks the state ready.
    /// Returns whether anything changed.
    pub(crate) fn apply(&mut self, resolved: Option<(Identity, User)>) -> bool {
        let (identity, user) = match resolved {
            Some((identity, user)) => (Some(identity), Some(user)),
            None => (None, None),
        };
        let changed = self.identity != identity || self.user != user || !self.ready;
        self.identity = identity;
        self.user = user;
        self.ready = true;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionTokens;

    fn resolved() -> (Identity, User) {
        let identity = Identity::new("u1", "a@x.com", SessionTokens::default());
        let user = User::from_identity(&identity);
        (identity, user)
    }

    #[test]
    fn test_initial_state() {
        let state = SessionState::default();
        assert!(!state.ready());
        assert_eq!(state.phase(), SessionPhase::Uninitialized);
        assert_eq!(state.route(), Route::Loading);
    }

    #[test]
    fn test_apply_sets_both_halves() {
        let mut state = SessionState::default();
        assert!(state.apply(Some(resolved())));
        assert!(state.identity().is_some());
        assert!(state.user().is_some());
        assert_eq!(state.route(), Route::App);

        assert!(state.apply(None));
        assert!(state.identity().is_none());
        assert!(state.user().is_none());
        assert!(state.ready());
        assert_eq!(state.route(), Route::Auth);
    }

    #[test]
    fn test_apply_same_input_reports_no_change() {
        let mut state = SessionState::default();
        assert!(state.apply(None));
        assert!(!state.apply(None));

        assert!(state.apply(Some(resolved())));
        assert!(!state.apply(Some(resolved())));
    }
}
