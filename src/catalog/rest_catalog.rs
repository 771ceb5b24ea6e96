use std::time::Duration;

use cached::Return;
#[allow(unused_imports)]
use cached::proc_macro::cached;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::base::Catalog;
use crate::models::{GolfCart, cart::sort_by_price};
use crate::utils::log_throttle::LogThrottle;

const CACHE_HIT_LOG_WINDOW: Duration = Duration::from_secs(30);

/// The config needed to read carts from the hosted REST data API.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct RestCatalogConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub url: String,
    pub anon_key: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
}

fn default_name() -> String {
    "rest".to_string()
}

fn default_table() -> String {
    "golf_carts".to_string()
}

fn default_timeout_in_ms() -> u64 {
    10_000
}

pub struct RestCatalog {
    config: RestCatalogConfig,
    cache_hits: LogThrottle,
}

impl RestCatalog {
    pub fn new(config: &RestCatalogConfig) -> Self {
        info!(
            "Creating REST catalog '{}' for table '{}'",
            config.name, config.table
        );
        Self {
            config: config.clone(),
            cache_hits: LogThrottle::new(CACHE_HIT_LOG_WINDOW),
        }
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.url.trim_end_matches('/'),
            self.config.table
        )
    }

    /// Logs a cache hit for `operation`, at most once per window per
    /// operation. Returns whether a line was written.
    fn log_cache_hit(&self, operation: &'static str) -> bool {
        let Some(suppressed_count) = self.cache_hits.should_emit(operation) else {
            return false;
        };
        debug!(
            event_name = "catalog.rest.cache.hit",
            event_domain = "catalog",
            catalog_name = self.config.name.as_str(),
            operation,
            cache_result = "hit",
            cache_ttl_seconds = 60,
            suppressed_count,
            "catalog result served from cache"
        );
        true
    }
}

/// Cart ids are slugs or UUIDs; anything else cannot match a row.
fn is_valid_cart_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait::async_trait]
impl Catalog for RestCatalog {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    async fn list_carts(&self) -> Result<Vec<GolfCart>, String> {
        let carts = query_carts(
            self.table_url(),
            vec![
                ("select".to_string(), "*".to_string()),
                ("order".to_string(), "price.asc".to_string()),
            ],
            self.config.anon_key.clone(),
            self.config.timeout_in_ms,
        )
        .await?;
        if carts.was_cached {
            self.log_cache_hit("list");
        }
        let mut carts = (*carts).clone();
        // The service already orders by price; keep the guarantee locally.
        sort_by_price(&mut carts);
        Ok(carts)
    }

    async fn get_cart(&self, id: &str) -> Result<Option<GolfCart>, String> {
        if !is_valid_cart_id(id) {
            debug!("Rejecting malformed cart id without a request");
            return Ok(None);
        }
        let carts = query_carts(
            self.table_url(),
            vec![
                ("id".to_string(), format!("eq.{}", id)),
                ("select".to_string(), "*".to_string()),
            ],
            self.config.anon_key.clone(),
            self.config.timeout_in_ms,
        )
        .await?;
        if carts.was_cached {
            self.log_cache_hit("get");
        }
        Ok(carts.iter().find(|cart| cart.id == id).cloned())
    }
}

/// Fetches cart rows from `table_url` filtered by `params`, returning them in
/// response order.
#[cfg_attr(
    not(test),
    cached(
        time = 60,
        size = 256,
        result = true,
        with_cached_flag = true,
        sync_writes = true
    )
)]
async fn query_carts(
    table_url: String,
    params: Vec<(String, String)>,
    anon_key: String,
    timeout_in_ms: u64,
) -> Result<Return<Vec<GolfCart>>, String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_in_ms))
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    debug!("Sending catalog request to: {}", table_url);
    let response = client
        .get(&table_url)
        .query(&params)
        .header("apikey", &anon_key)
        .bearer_auth(&anon_key)
        .send()
        .await
        .map_err(|e| format!("Error sending request: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("Unexpected status code: {}", response.status()));
    }

    let body = response
        .text()
        .await
        .map_err(|e| format!("Error reading response body: {}", e))?;
    let carts: Vec<GolfCart> =
        serde_json::from_str(&body).map_err(|e| format!("Error parsing JSON: {}", e))?;
    Ok(Return::new(carts))
}
