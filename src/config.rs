use std::env;
use std::fs;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::TrackedProduct;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub max_concurrent_checks: usize,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Start-to-start cycle cadence in seconds.
    pub check_interval_secs: u64,
    pub products_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    pub webhook_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("FIYAT").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database max_connections must be greater than 0".into(),
            ));
        }

        if self.scraper.max_concurrent_checks == 0 {
            return Err(ConfigError::Message(
                "scraper max_concurrent_checks must be greater than 0".into(),
            ));
        }

        if self.scraper.retry_attempts == 0 {
            return Err(ConfigError::Message(
                "scraper retry_attempts must be greater than 0".into(),
            ));
        }

        if self.scheduler.check_interval_secs == 0 {
            return Err(ConfigError::Message(
                "scheduler check_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

/// The persisted tracked-product list: a JSON mapping with a `products` key.
/// This file is the source of truth across restarts; the scheduler's
/// in-memory copy is authoritative during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductsFile {
    pub products: Vec<TrackedProduct>,
}

impl ProductsFile {
    /// A missing or malformed file is a configuration error, not a fatal one:
    /// the tracker still starts, with an empty set, and the condition is
    /// logged.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "products file not readable, starting with an empty tracked set"
                );
                return Self::default();
            }
        };

        match serde_json::from_str::<ProductsFile>(&raw) {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "products file malformed, starting with an empty tracked set"
                );
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }
}
