use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::context::{StoreError, VehicleId};
use crate::position::TrackError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("replay track: {0}")]
    Track(#[from] TrackError),
    #[error("state file: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub control: ControlConfig,
    /// Where credential and vehicle selection are kept between runs.
    pub state_file: Option<PathBuf>,
    pub token: Option<String>,
    pub vehicle_id: Option<VehicleId>,
    /// No section means the device has no position sensing.
    pub position: Option<PositionConfig>,
    /// No section means the device cannot keep the screen awake.
    pub wake_lock: Option<WakeLockConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionConfig {
    pub replay: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WakeLockConfig {
    pub command: String,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.api.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }
        self.control.bind.parse::<SocketAddr>().map_err(|e| {
            ConfigError::Invalid(format!("control.bind '{}': {}", self.control.bind, e))
        })?;
        if let Some(wake_lock) = &self.wake_lock {
            if wake_lock.command.trim().is_empty() {
                return Err(ConfigError::Invalid("wake_lock.command is empty".into()));
            }
        }
        Ok(())
    }
}
