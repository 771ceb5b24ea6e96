pub mod base;
pub mod plain_catalog;
pub mod rest_catalog;

pub use base::*;
