//! Transport-level seam between the lifecycle adapter and a container runtime.
//!
//! Engine payloads are reshaped into the view structs below. Every field is
//! optional on the wire: absent or `null` values fall back to their defaults,
//! so a sparse response degrades to zeros and empty strings instead of failing.

use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::telemetry::StatsSample;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("no such container: {0}")]
    NotFound(String),
    #[error("runtime unreachable: {0}")]
    Unavailable(String),
    #[error("runtime responded with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("undecodable runtime payload: {0}")]
    Decode(String),
}

impl From<BollardError> for GatewayError {
    fn from(err: BollardError) -> Self {
        match err {
            BollardError::DockerResponseServerError {
                status_code: 404,
                message,
            } => GatewayError::NotFound(message),
            BollardError::DockerResponseServerError {
                status_code,
                message,
            } => GatewayError::Rejected {
                status: status_code,
                message,
            },
            BollardError::JsonDataError { message, .. } => GatewayError::Decode(message),
            BollardError::JsonSerdeError { err } => GatewayError::Decode(err.to_string()),
            other => GatewayError::Unavailable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Live log bytes; dropping the stream closes the underlying connection.
pub type LogStream = BoxStream<'static, GatewayResult<Bytes>>;

/// Everything the runtime needs to create one simulation container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSpec {
    pub image: String,
    pub cmd: Vec<String>,
    /// `KEY=VALUE` entries.
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
    /// `host:container[:mode]` bind specifications, passed through as given.
    pub binds: Vec<String>,
}

/// Log query: stdout and stderr are always both requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRequest {
    pub tail: usize,
    pub follow: bool,
    pub timestamps: bool,
}

impl LogRequest {
    /// Bounded, timestamped snapshot of the last `tail` lines.
    pub fn snapshot(tail: usize) -> Self {
        Self {
            tail,
            follow: false,
            timestamps: true,
        }
    }

    /// Live follow seeded with the last `tail` lines.
    pub fn follow(tail: usize) -> Self {
        Self {
            tail,
            follow: true,
            timestamps: true,
        }
    }
}

#[async_trait]
pub trait RuntimeGateway: Send + Sync {
    /// Create a container and return its full id.
    async fn create(&self, spec: ContainerSpec) -> GatewayResult<String>;

    async fn start(&self, container_id: &str) -> GatewayResult<()>;

    /// Stop with a grace period before forced termination. Stopping an
    /// already-stopped container succeeds.
    async fn stop(&self, reference: &str, grace: Duration) -> GatewayResult<()>;

    async fn remove(&self, reference: &str, force: bool, remove_volumes: bool)
        -> GatewayResult<()>;

    async fn inspect(&self, reference: &str) -> GatewayResult<ContainerDetails>;

    /// All containers, running or not, matching a `key=value` label filter.
    async fn list(&self, label_filter: &str) -> GatewayResult<Vec<ContainerListing>>;

    /// One non-streaming resource sample; `None` when the runtime sent nothing.
    async fn stats(&self, reference: &str) -> GatewayResult<Option<StatsSample>>;

    /// Open a log stream. Fails up front when the container does not exist.
    async fn logs(&self, reference: &str, request: LogRequest) -> GatewayResult<LogStream>;
}

/// Inspect view of one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerDetails {
    pub id: String,
    /// RFC3339 creation time.
    pub created: String,
    pub state: RawState,
    pub config: ContainerConfigView,
    pub host_config: HostConfigView,
}

/// Full state block as reported by inspect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawState {
    pub status: String,
    pub running: bool,
    pub paused: bool,
    pub restarting: bool,
    pub dead: bool,
    pub exit_code: i64,
    pub started_at: String,
    pub finished_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerConfigView {
    pub image: String,
    pub labels: HashMap<String, String>,
    pub cmd: Vec<String>,
    pub env: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HostConfigView {
    pub binds: Vec<String>,
}

/// List view of one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerListing {
    pub id: String,
    pub image: String,
    /// Unix seconds.
    pub created: i64,
    pub labels: HashMap<String, String>,
    /// Bare status word such as `running` or `exited`.
    pub state: String,
    /// Human readable status such as `Up 5 minutes`.
    pub status: String,
}

/// Reshape any serializable engine payload into one of the views above.
pub(crate) fn reshape<S, T>(payload: &S) -> GatewayResult<T>
where
    S: Serialize,
    T: DeserializeOwned,
{
    decode_value(serde_json::to_value(payload)?)
}

/// Decode a JSON document into a view, treating `null` members as absent.
pub(crate) fn decode_value<T: DeserializeOwned>(mut value: Value) -> GatewayResult<T> {
    strip_nulls(&mut value);
    Ok(serde_json::from_value(value)?)
}

fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}
