use autobox_common::chrono::{DateTime, Datelike, TimeZone, Utc};
use autobox_common::{Metrics, Simulation, SimulationConfig, SimulationStatus};
use autobox_config::Settings;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::docker::BollardGateway;
use crate::gateway::{
    ContainerDetails, ContainerListing, ContainerSpec, GatewayError, LogRequest, RuntimeGateway,
};
use crate::labels::{
    is_managed, managed_label_filter, short_id, simulation_labels, CONFIG_PATH_LABEL,
    CREATED_AT_LABEL, NAME_LABEL,
};
use crate::telemetry::derive_metrics;
use crate::{status, ExecutorError, Operation, Result};

/// Live log bytes from [`LifecycleAdapter::stream_logs`].
pub type SimulationLogStream = BoxStream<'static, Result<Bytes>>;

/// Tunables taken from [`Settings`] at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterOptions {
    pub stop_grace_period: Duration,
    /// Best-effort stop before a forced remove.
    pub remove_grace_period: Duration,
    pub network_interface: String,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            stop_grace_period: Duration::from_secs(30),
            remove_grace_period: Duration::from_secs(10),
            network_interface: "eth0".to_string(),
        }
    }
}

impl From<&Settings> for AdapterOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            stop_grace_period: settings.lifecycle.stop_grace_period(),
            remove_grace_period: settings.lifecycle.remove_grace_period(),
            network_interface: settings.lifecycle.network_interface.clone(),
        }
    }
}

/// Maps simulations onto labelled containers.
///
/// Holds no state besides the gateway handle; every call goes to the runtime,
/// so clones can be shared freely across tasks.
#[derive(Clone)]
pub struct LifecycleAdapter {
    gateway: Arc<dyn RuntimeGateway>,
    options: AdapterOptions,
}

impl LifecycleAdapter {
    pub fn new(gateway: Arc<dyn RuntimeGateway>, options: AdapterOptions) -> Self {
        Self { gateway, options }
    }

    /// Connect to Docker as configured in `settings`.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let gateway = BollardGateway::connect(&settings.docker)
            .await
            .map_err(|e| ExecutorError::RuntimeUnavailable {
                operation: Operation::Connect,
                reason: e.to_string(),
            })?;
        Ok(Self::new(Arc::new(gateway), AdapterOptions::from(settings)))
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    /// Create and start a simulation container.
    ///
    /// A start failure leaves the created container in place; its id is
    /// carried by [`ExecutorError::StartFailed`].
    #[instrument(skip(self, config), fields(image = %config.image, name = %config.display_name()))]
    pub async fn launch(&self, config: SimulationConfig) -> Result<Simulation> {
        if config.image.trim().is_empty() {
            return Err(ExecutorError::CreateFailed {
                reason: "image reference must not be empty".to_string(),
            });
        }

        let created_at = Utc::now();
        let name = config.display_name().to_string();
        let spec = ContainerSpec {
            image: config.image.clone(),
            cmd: launch_args(&config),
            env: config.env_entries(),
            labels: simulation_labels(&name, &config.config_path, created_at),
            binds: config.volumes.clone(),
        };

        let container_id = self.gateway.create(spec).await.map_err(|e| match e {
            GatewayError::Unavailable(reason) => ExecutorError::RuntimeUnavailable {
                operation: Operation::Launch,
                reason,
            },
            other => ExecutorError::CreateFailed {
                reason: other.to_string(),
            },
        })?;
        info!(%container_id, "Container created");

        if let Err(e) = self.gateway.start(&container_id).await {
            warn!(%container_id, error = %e, "Container start failed, leaving it in place");
            return Err(ExecutorError::StartFailed {
                container_id,
                reason: e.to_string(),
            });
        }
        info!(%container_id, "Simulation started");

        Ok(Simulation {
            id: short_id(&container_id).to_string(),
            name,
            container_id,
            status: SimulationStatus::Running,
            created_at,
            started_at: Some(Utc::now()),
            finished_at: None,
            config,
        })
    }

    #[instrument(skip(self))]
    pub async fn inspect(&self, reference: &str) -> Result<Simulation> {
        let details = self
            .gateway
            .inspect(reference)
            .await
            .map_err(|e| query_error(Operation::Inspect, reference, e))?;
        let simulation = simulation_from_details(details);
        debug!(container_id = %simulation.container_id, status = %simulation.status, "Inspected simulation");
        Ok(simulation)
    }

    /// Every managed simulation, running or terminated, in runtime order.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Simulation>> {
        let listings = self
            .gateway
            .list(&managed_label_filter())
            .await
            .map_err(|e| query_error(Operation::List, "simulations", e))?;

        let simulations: Vec<Simulation> = listings
            .into_iter()
            .filter(|listing| is_managed(&listing.labels))
            .map(simulation_from_listing)
            .collect();
        debug!(count = simulations.len(), "Listed simulations");
        Ok(simulations)
    }

    #[instrument(skip(self))]
    pub async fn metrics(&self, reference: &str) -> Result<Metrics> {
        let sample = self
            .gateway
            .stats(reference)
            .await
            .map_err(|e| query_error(Operation::Metrics, reference, e))?
            .unwrap_or_default();
        Ok(derive_metrics(
            &sample,
            &self.options.network_interface,
            Utc::now(),
        ))
    }

    #[instrument(skip(self))]
    pub async fn stop(&self, reference: &str) -> Result<()> {
        self.gateway
            .stop(reference, self.options.stop_grace_period)
            .await
            .map_err(|e| match e {
                GatewayError::NotFound(_) => ExecutorError::NotFound {
                    operation: Operation::Stop,
                    reference: reference.to_string(),
                },
                GatewayError::Unavailable(reason) => ExecutorError::RuntimeUnavailable {
                    operation: Operation::Stop,
                    reason,
                },
                other => ExecutorError::StopFailed {
                    reference: reference.to_string(),
                    reason: other.to_string(),
                },
            })?;
        info!("Simulation stopped");
        Ok(())
    }

    /// Remove a simulation container and its anonymous volumes.
    ///
    /// With `force`, a short best-effort stop runs first and its outcome is
    /// ignored. Without it, removing a running container fails.
    #[instrument(skip(self))]
    pub async fn remove(&self, reference: &str, force: bool) -> Result<()> {
        if force {
            if let Err(e) = self
                .gateway
                .stop(reference, self.options.remove_grace_period)
                .await
            {
                debug!(error = %e, "Best-effort stop before removal failed");
            }
        }

        self.gateway
            .remove(reference, force, true)
            .await
            .map_err(|e| ExecutorError::RemoveFailed {
                reference: reference.to_string(),
                reason: e.to_string(),
            })?;
        info!("Simulation removed");
        Ok(())
    }

    /// Last `tail` lines of stdout and stderr, timestamped, as one text blob.
    #[instrument(skip(self))]
    pub async fn read_logs(&self, reference: &str, tail: usize) -> Result<String> {
        let mut stream = self
            .gateway
            .logs(reference, LogRequest::snapshot(tail))
            .await
            .map_err(|e| query_error(Operation::Logs, reference, e))?;

        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| query_error(Operation::Logs, reference, e))?;
            buffer.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Follow the logs live, starting from the last `tail` lines.
    ///
    /// The connection stays open until the returned stream is dropped.
    #[instrument(skip(self))]
    pub async fn stream_logs(&self, reference: &str, tail: usize) -> Result<SimulationLogStream> {
        let stream = self
            .gateway
            .logs(reference, LogRequest::follow(tail))
            .await
            .map_err(|e| query_error(Operation::LogStream, reference, e))?;

        let reference = reference.to_string();
        Ok(stream
            .map(move |chunk| chunk.map_err(|e| query_error(Operation::LogStream, &reference, e)))
            .boxed())
    }
}

/// Error mapping for operations without a lifecycle-specific failure.
fn query_error(operation: Operation, reference: &str, err: GatewayError) -> ExecutorError {
    match err {
        GatewayError::NotFound(_) => ExecutorError::NotFound {
            operation,
            reference: reference.to_string(),
        },
        GatewayError::Unavailable(reason) => ExecutorError::RuntimeUnavailable { operation, reason },
        GatewayError::Decode(message) => ExecutorError::DecodeError { operation, message },
        GatewayError::Rejected { status, message } => ExecutorError::Rejected {
            operation,
            reference: reference.to_string(),
            status,
            message,
        },
    }
}

fn launch_args(config: &SimulationConfig) -> Vec<String> {
    vec![
        "--config".to_string(),
        config.config_path.clone(),
        "--metrics".to_string(),
        config.metrics_path.clone(),
        "--server".to_string(),
        config.server_path.clone(),
    ]
}

/// Value of `--flag value` or `--flag=value`.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == flag {
            return iter.next().cloned();
        }
        if let Some(value) = arg.strip_prefix(flag).and_then(|rest| rest.strip_prefix('=')) {
            return Some(value.to_string());
        }
    }
    None
}

/// RFC3339 timestamp; empty, unparseable and zero-valued times are unset.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw.trim()).ok()?;
    let parsed = parsed.with_timezone(&Utc);
    (parsed.year() > 1).then_some(parsed)
}

fn simulation_from_details(details: ContainerDetails) -> Simulation {
    let ContainerDetails {
        id: container_id,
        created,
        state,
        config: runtime_config,
        host_config,
    } = details;
    let labels = runtime_config.labels;

    let name = labels.get(NAME_LABEL).cloned().unwrap_or_default();
    let created_at = parse_timestamp(&created)
        .or_else(|| labels.get(CREATED_AT_LABEL).and_then(|raw| parse_timestamp(raw)))
        .unwrap_or_default();

    let config_path = labels
        .get(CONFIG_PATH_LABEL)
        .cloned()
        .or_else(|| flag_value(&runtime_config.cmd, "--config"))
        .unwrap_or_default();
    let environment: BTreeMap<String, String> = runtime_config
        .env
        .iter()
        .filter_map(|entry| entry.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    let config = SimulationConfig {
        name: Some(name.clone()).filter(|n| !n.is_empty() && *n != config_path),
        metrics_path: flag_value(&runtime_config.cmd, "--metrics").unwrap_or_default(),
        server_path: flag_value(&runtime_config.cmd, "--server").unwrap_or_default(),
        image: runtime_config.image,
        environment,
        volumes: host_config.binds,
        config_path,
    };

    Simulation {
        id: short_id(&container_id).to_string(),
        name,
        status: status::from_state(&state),
        created_at,
        started_at: parse_timestamp(&state.started_at),
        finished_at: parse_timestamp(&state.finished_at),
        container_id,
        config,
    }
}

fn simulation_from_listing(listing: ContainerListing) -> Simulation {
    let ContainerListing {
        id: container_id,
        image,
        created,
        labels,
        state,
        ..
    } = listing;

    let created_at = Utc
        .timestamp_opt(created, 0)
        .single()
        .filter(|_| created > 0)
        .or_else(|| labels.get(CREATED_AT_LABEL).and_then(|raw| parse_timestamp(raw)))
        .unwrap_or_default();

    Simulation {
        id: short_id(&container_id).to_string(),
        name: labels.get(NAME_LABEL).cloned().unwrap_or_default(),
        status: status::from_status_word(&state),
        created_at,
        started_at: None,
        finished_at: None,
        container_id,
        config: SimulationConfig {
            config_path: labels.get(CONFIG_PATH_LABEL).cloned().unwrap_or_default(),
            image,
            ..Default::default()
        },
    }
}
