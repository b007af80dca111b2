//! Simulation lifecycle and telemetry on top of a container runtime.
//!
//! [`LifecycleAdapter`] is the entry point: it turns a [`SimulationConfig`]
//! into a labelled container, projects managed containers back into
//! [`Simulation`] values, and derives [`Metrics`] from runtime counters.
//! Everything runtime-specific sits behind [`RuntimeGateway`]; [`BollardGateway`]
//! is the Docker implementation.

use autobox_common::AutoboxError;
use std::fmt;
use thiserror::Error;

pub mod adapter;
pub mod docker;
pub mod gateway;
pub mod labels;
pub mod status;
pub mod telemetry;

// Re-export dependencies front ends may need
pub use autobox_common as common;
pub use bollard;

pub use adapter::{AdapterOptions, LifecycleAdapter, SimulationLogStream};
pub use autobox_common::{Metrics, Simulation, SimulationConfig, SimulationStatus};
pub use docker::BollardGateway;
pub use gateway::{
    ContainerDetails, ContainerListing, ContainerSpec, GatewayError, GatewayResult, LogRequest,
    LogStream, RawState, RuntimeGateway,
};
pub use telemetry::{derive_metrics, StatsSample};

/// Public operation an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    Launch,
    Inspect,
    List,
    Metrics,
    Stop,
    Remove,
    Logs,
    LogStream,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Connect => "connect",
            Operation::Launch => "launch",
            Operation::Inspect => "inspect",
            Operation::List => "list",
            Operation::Metrics => "metrics",
            Operation::Stop => "stop",
            Operation::Remove => "remove",
            Operation::Logs => "logs",
            Operation::LogStream => "log stream",
        };
        f.write_str(name)
    }
}

// --- Custom Error Type ---
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("{operation}: container runtime unavailable: {reason}")]
    RuntimeUnavailable { operation: Operation, reason: String },
    #[error("{operation}: container {reference} not found")]
    NotFound {
        operation: Operation,
        reference: String,
    },
    #[error("launch: container creation failed: {reason}")]
    CreateFailed { reason: String },
    /// The container exists but never started; it is not cleaned up.
    #[error("launch: container {container_id} was created but failed to start: {reason}")]
    StartFailed {
        container_id: String,
        reason: String,
    },
    #[error("stop: container {reference} could not be stopped: {reason}")]
    StopFailed { reference: String, reason: String },
    #[error("remove: container {reference} could not be removed: {reason}")]
    RemoveFailed { reference: String, reason: String },
    #[error("{operation}: malformed runtime payload: {message}")]
    DecodeError { operation: Operation, message: String },
    #[error("{operation}: runtime rejected request for {reference} (status {status}): {message}")]
    Rejected {
        operation: Operation,
        reference: String,
        status: u16,
        message: String,
    },
}

impl From<ExecutorError> for AutoboxError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::NotFound { .. } => AutoboxError::NotFound(err.to_string()),
            other => AutoboxError::Runtime(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
