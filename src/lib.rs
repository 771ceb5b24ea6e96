//! Library exports for sessiontron, shared between the binary and tests.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod forms;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod session;
pub mod startup;
pub mod state;
pub mod utils;
