use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use crate::backend::BackendConfig;
use crate::catalog::CatalogConfig;

/// Environment variable naming the config file to load.
pub const CONFIG_PATH_ENV: &str = "SESSIONTRON_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: where to listen, how to log, and which backend
/// and catalog to talk to.
#[derive(Deserialize, Serialize, Debug, JsonSchema)]
pub struct ConfigV1 {
    pub bind_address: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub backend: BackendConfig,
    pub catalog: CatalogConfig,
}

impl From<Config> for ConfigV1 {
    fn from(config: Config) -> Self {
        match config {
            Config::ConfigV1(c) => c,
        }
        // handle configuration migration between versions here when necessary
    }
}

/// Load config from the YAML file named by `SESSIONTRON_CONFIG` (default
/// "./config.yaml"), with `SESSIONTRON_`-prefixed environment overrides.
pub fn load_config() -> Result<ConfigV1, figment::Error> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let figment = Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed("SESSIONTRON_").ignore(&["CONFIG"]).split("__"));
    figment.extract::<Config>().map(ConfigV1::from)
}

/// Parse a config from a YAML string.
pub fn config_from_yaml(yaml: &str) -> Result<ConfigV1, figment::Error> {
    Figment::new()
        .merge(Yaml::string(yaml))
        .extract::<Config>()
        .map(ConfigV1::from)
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
