use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::plain_catalog::{PlainCatalog, PlainCatalogConfig};
use super::rest_catalog::{RestCatalog, RestCatalogConfig};
use crate::models::GolfCart;

/// Catalog selection, tagged by `type` in the YAML.
#[derive(Deserialize, Serialize, Debug, JsonSchema)]
#[serde(tag = "type")]
pub enum CatalogConfig {
    #[serde(rename = "plain")]
    Plain(PlainCatalogConfig),
    #[serde(rename = "rest")]
    Rest(RestCatalogConfig),
}

/// Read-only source of golf carts.
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    fn get_name(&self) -> &str;
    /// All carts, cheapest first.
    async fn list_carts(&self) -> Result<Vec<GolfCart>, String>;
    async fn get_cart(&self, id: &str) -> Result<Option<GolfCart>, String>;
}

/// Create a catalog from a given config.
pub fn create_catalog(config: &CatalogConfig) -> Arc<dyn Catalog> {
    match config {
        CatalogConfig::Plain(cfg) => {
            info!(catalog_type = "plain", carts = cfg.carts.len(), "created catalog");
            Arc::new(PlainCatalog::new(cfg))
        }
        CatalogConfig::Rest(cfg) => {
            info!(catalog_type = "rest", url = cfg.url.as_str(), "created catalog");
            Arc::new(RestCatalog::new(cfg))
        }
    }
}
