// Shared data model for Autobox simulations and the types front ends render.

use thiserror::Error;

mod metrics;
mod simulation;

pub use metrics::{DiskStats, Metrics, NetworkStats};
pub use simulation::{Simulation, SimulationConfig, SimulationStatus};

pub use chrono;
pub use serde::{Deserialize, Serialize};

/// Open document tree used for simulation, metrics and server config blobs.
///
/// These files are passed through to the workload untouched, so they are
/// kept as generic JSON rather than a fixed schema.
pub type Document = serde_json::Value;

#[derive(Error, Debug)]
pub enum AutoboxError {
    #[error("Runtime Error: {0}")]
    Runtime(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

// Primary Result type for front ends that mix config and runtime calls
pub type Result<T> = std::result::Result<T, AutoboxError>;
