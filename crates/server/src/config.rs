//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Artifact written by `usagectl train`
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_model_path() -> PathBuf {
    PathBuf::from(usage_lib::artifact::DEFAULT_ARTIFACT_PATH)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model_path: default_model_path(),
        }
    }
}

impl ServerConfig {
    /// Load from `USAGE_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("USAGE").try_parsing(true))
            .build()
            .context("Failed to read USAGE_* environment")?;

        config
            .try_deserialize()
            .context("Invalid server configuration")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
