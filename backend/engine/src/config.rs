//! Application configuration loaded from environment variables.

use crate::errors::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// How often (in seconds) the sweeper re-derives challenge statuses
    pub sweep_interval_secs: u64,
    /// Cap on merged history feed length
    pub max_feed_results: usize,
    /// Voucher lifetime in days; 0 means vouchers never expire
    pub voucher_ttl_days: i64,
    /// Bounded attempts for the asynchronous challenge fan-out retry
    pub fanout_retry_attempts: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./donor_engine.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid API_PORT".to_string()))?,
            sweep_interval_secs: env_var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid SWEEP_INTERVAL_SECS".to_string()))?,
            max_feed_results: env_var("MAX_FEED_RESULTS")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid MAX_FEED_RESULTS".to_string()))?,
            voucher_ttl_days: env_var("VOUCHER_TTL_DAYS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid VOUCHER_TTL_DAYS".to_string()))?,
            fanout_retry_attempts: env_var("FANOUT_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| EngineError::Config("Invalid FANOUT_RETRY_ATTEMPTS".to_string()))?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| EngineError::Config(format!("Missing env var: {key}")))
}
