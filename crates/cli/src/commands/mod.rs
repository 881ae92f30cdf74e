//! Subcommand implementations

pub mod inspect;
pub mod predict;
pub mod stats;
pub mod status;
pub mod train;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use usage_lib::source::MySqlSource;
use usage_lib::TrainingConfig;

/// Flags that override `USAGE_*` training settings
#[derive(Debug, Clone, Default)]
pub struct TrainingOverrides {
    pub database_url: Option<String>,
    pub output: Option<std::path::PathBuf>,
    pub window_days: Option<u32>,
    pub test_fraction: Option<f64>,
    pub seed: Option<u64>,
}

impl TrainingOverrides {
    /// Environment configuration with command-line flags applied on top
    pub fn resolve(&self) -> Result<TrainingConfig> {
        let mut config = TrainingConfig::load().context("Invalid training configuration")?;
        self.apply(&mut config);
        config.validate().context("Invalid training configuration")?;
        Ok(config)
    }

    fn apply(&self, config: &mut TrainingConfig) {
        if let Some(url) = &self.database_url {
            config.database_url = Some(url.clone());
        }
        if let Some(path) = &self.output {
            config.model_path = path.clone();
        }
        if let Some(days) = self.window_days {
            config.window_days = days;
        }
        if let Some(fraction) = self.test_fraction {
            config.test_fraction = fraction;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
    }
}

/// Open the platform database named in the configuration
pub async fn connect(config: &TrainingConfig) -> Result<MySqlSource> {
    let url = config
        .database_url
        .as_deref()
        .context("No database configured; pass --database-url or set DATABASE_URL")?;
    MySqlSource::connect(url)
        .await
        .context("Failed to connect to the station database")
}

/// Reference time for the trailing window. Session timestamps are stored in local time.
pub fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
