use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// A golf cart as listed in the catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct GolfCart {
    pub id: String,
    pub model_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "deserialize_price")]
    pub price: f64,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub seats: Option<u32>,
    #[serde(default)]
    pub battery_capacity: Option<String>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub range_per_charge: Option<f64>,
    /// Feature name -> whether this model has it.
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl GolfCart {
    pub fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    pub fn enabled_features(&self) -> Vec<&str> {
        self.features
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Numeric columns may come back either as JSON numbers or as strings.
fn deserialize_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Price {
        Number(f64),
        Text(String),
    }

    let price = match Price::deserialize(deserializer)? {
        Price::Number(n) => n,
        Price::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid price '{}': {}", s, e)))?,
    };
    if !price.is_finite() {
        return Err(serde::de::Error::custom(format!(
            "invalid price '{}': not a finite number",
            price
        )));
    }
    Ok(price)
}

/// Sort carts cheapest first.
pub fn sort_by_price(carts: &mut [GolfCart]) {
    carts.sort_by(|a, b| a.price.total_cmp(&b.price));
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::{
        Figment,
        providers::{Format, Yaml},
    };
    use serde_json::json;

    #[test]
    fn test_price_from_string_or_number() {
        let from_text: GolfCart = serde_json::from_value(json!({
            "id": "1",
            "model_name": "Classic Elite",
            "price": "8999.99"
        }))
        .unwrap();
        assert_eq!(from_text.price, 8999.99);

        let from_number: GolfCart = serde_json::from_value(json!({
            "id": "2",
            "model_name": "Sport GTX",
            "price": 14999.99
        }))
        .unwrap();
        assert_eq!(from_number.price, 14999.99);
    }

    #[test]
    fn test_invalid_price_rejected() {
        let result: Result<GolfCart, _> = serde_json::from_value(json!({
            "id": "1",
            "model_name": "Broken",
            "price": "cheap"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_finite_price_rejected() {
        for price in ["NaN", "inf", "-Infinity", " nan "] {
            let result: Result<GolfCart, _> = serde_json::from_value(json!({
                "id": "1",
                "model_name": "Broken",
                "price": price
            }));
            assert!(result.is_err(), "{price}");
        }

        // YAML can carry non-finite numbers directly.
        for price in [".nan", ".inf", "-.inf"] {
            let yaml = format!("id: '1'\nmodel_name: Broken\nprice: {}\n", price);
            let result: Result<GolfCart, _> = Figment::new().merge(Yaml::string(&yaml)).extract();
            assert!(result.is_err(), "{price}");
        }
    }

    #[test]
    fn test_stock_and_features() {
        let cart: GolfCart = serde_json::from_value(json!({
            "id": "4",
            "model_name": "Executive Package",
            "price": 15499.99,
            "stock_quantity": 0,
            "features": {"Premium audio system": true, "Rain cover": false}
        }))
        .unwrap();
        assert!(!cart.in_stock());
        assert_eq!(cart.enabled_features(), vec!["Premium audio system"]);
    }
}
