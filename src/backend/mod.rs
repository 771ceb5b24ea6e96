pub mod base;
pub mod events;
pub mod memory;
pub mod rest;

// Re-export the primary backend items so code outside can do
// "use crate::backend::{IdentityService, ProfileStore, create_backend};"
pub use base::{
    Backend, BackendConfig, BackendError, IdentityService, ProfileStore, SignUpMetadata,
    SignUpOutcome, create_backend,
};
pub use events::{AuthEvent, AuthEventKind, AuthEvents, Notification, Subscription};
