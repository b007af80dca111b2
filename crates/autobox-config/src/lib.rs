//! Resolved configuration for Autobox.
//!
//! [`Settings`] is built once at process start from layered sources and then
//! passed by reference to whatever needs it; nothing in this workspace reads
//! configuration from ambient global state. [`SimulationCatalog`] resolves
//! named simulations to the JSON files kept under `~/.autobox/config`.

use std::path::PathBuf;

use autobox_common::AutoboxError;
use thiserror::Error;

mod catalog;
mod settings;

pub use catalog::{SimulationCatalog, SimulationConfigSet, CONTAINER_CONFIG_ROOT};
pub use settings::{
    home_dir, DockerSettings, LifecycleSettings, OutputFormat, OutputSettings, Settings,
    SimulationDefaults, ENV_PREFIX, ENV_SEPARATOR, SETTINGS_FILE_NAME,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("home directory could not be determined")]
    HomeUnavailable,
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid settings: {0}")]
    Invalid(String),
    #[error("simulation config not found: {0}")]
    SimulationNotFound(String),
    #[error("metrics config not found: {0} (simulation and metrics configs must have matching names)")]
    MetricsNotFound(String),
}

impl From<ConfigError> for AutoboxError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::SimulationNotFound(_) | ConfigError::MetricsNotFound(_) => {
                AutoboxError::NotFound(err.to_string())
            }
            other => AutoboxError::Config(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
