use serde::Deserialize;
use std::env;

use tokri_courier::gateway::CourierConfig;
use tokri_courier::tariff::ShippingRates;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub courier: CourierConfig,
    pub shipping: ShippingRates,
    pub reconcile: ReconcileConfig,
    pub returns: ReturnPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Cadence and batch bound of the background courier sweep.
#[derive(Debug, Deserialize, Clone)]
pub struct ReconcileConfig {
    pub interval_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_batch_size() -> u32 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReturnPolicy {
    pub window_days: i64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Layer the environment-specific file on top; optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `TOKRI_SERVER__PORT=9000`
            .add_source(config::Environment::with_prefix("TOKRI").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
