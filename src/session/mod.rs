//! Session lifecycle: state, reconciliation and the controller that ties
//! them to the identity service.

pub mod controller;
pub mod error;
pub mod reconcile;
pub mod state;

pub use controller::SessionController;
pub use error::SessionError;
pub use reconcile::ReconcileOutcome;
pub use state::{Route, SessionPhase, SessionState};
