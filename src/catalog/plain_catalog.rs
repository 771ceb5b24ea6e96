use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::base::Catalog;
use crate::models::{GolfCart, cart::sort_by_price};

/// Carts listed directly in the config file.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct PlainCatalogConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub carts: Vec<GolfCart>,
}

fn default_name() -> String {
    "plain".to_string()
}

pub struct PlainCatalog {
    name: String,
    carts: Vec<GolfCart>,
}

impl PlainCatalog {
    pub fn new(config: &PlainCatalogConfig) -> Self {
        let mut carts = config.carts.clone();
        sort_by_price(&mut carts);
        PlainCatalog {
            name: config.name.clone(),
            carts,
        }
    }
}

#[async_trait::async_trait]
impl Catalog for PlainCatalog {
    fn get_name(&self) -> &str {
        &self.name
    }

    async fn list_carts(&self) -> Result<Vec<GolfCart>, String> {
        Ok(self.carts.clone())
    }

    async fn get_cart(&self, id: &str) -> Result<Option<GolfCart>, String> {
        Ok(self.carts.iter().find(|cart| cart.id == id).cloned())
    }
}
