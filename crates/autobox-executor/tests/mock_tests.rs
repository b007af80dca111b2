//! Lifecycle adapter tests against an in-memory container runtime.

use anyhow::Result;
use async_trait::async_trait;
use autobox_common::chrono::{SecondsFormat, Utc};
use autobox_executor::gateway::{ContainerConfigView, HostConfigView};
use autobox_executor::telemetry::{InterfaceStats, MemoryStats};
use autobox_executor::{
    AdapterOptions, ContainerDetails, ContainerListing, ContainerSpec, ExecutorError,
    GatewayError, GatewayResult, LifecycleAdapter, LogRequest, LogStream, RawState,
    RuntimeGateway, SimulationConfig, SimulationStatus, StatsSample,
};
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[derive(Clone, Debug)]
struct FakeContainer {
    id: String,
    spec: ContainerSpec,
    created: String,
    state: RawState,
    logs: Vec<String>,
    sample: Option<StatsSample>,
}

#[derive(Clone, Debug, Default)]
struct FakeBehavior {
    unavailable: bool,
    fail_start: bool,
    fail_stop: bool,
    /// Return every container from `list`, ignoring the label filter.
    ignore_filters: bool,
}

#[derive(Debug, PartialEq)]
enum Call {
    Stop(String, Duration),
    Remove {
        reference: String,
        force: bool,
        remove_volumes: bool,
    },
    Logs(String, LogRequest),
}

/// In-memory runtime that behaves like the Docker engine for the calls the adapter makes.
#[derive(Clone, Default)]
struct FakeRuntime {
    containers: Arc<Mutex<Vec<FakeContainer>>>,
    calls: Arc<Mutex<Vec<Call>>>,
    behavior: Arc<RwLock<FakeBehavior>>,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl FakeRuntime {
    async fn set_behavior(&self, behavior: FakeBehavior) {
        *self.behavior.write().await = behavior;
    }

    async fn check_available(&self) -> GatewayResult<()> {
        if self.behavior.read().await.unavailable {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    async fn container_count(&self) -> usize {
        self.containers.lock().await.len()
    }

    /// Insert a container directly, bypassing the adapter.
    async fn seed(&self, id: &str, labels: &[(&str, &str)], state: RawState) {
        let spec = ContainerSpec {
            image: "autobox-engine:latest".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        };
        self.containers.lock().await.push(FakeContainer {
            id: id.to_string(),
            spec,
            created: now_rfc3339(),
            state,
            logs: Vec::new(),
            sample: None,
        });
    }

    /// Simulate the workload process exiting on its own.
    async fn exit(&self, reference: &str, code: i64) {
        let mut containers = self.containers.lock().await;
        if let Some(container) = containers.iter_mut().find(|c| refers_to(c, reference)) {
            container.state.running = false;
            container.state.status = "exited".to_string();
            container.state.exit_code = code;
            container.state.finished_at = now_rfc3339();
        }
    }

    async fn set_logs(&self, reference: &str, lines: &[&str]) {
        let mut containers = self.containers.lock().await;
        if let Some(container) = containers.iter_mut().find(|c| refers_to(c, reference)) {
            container.logs = lines.iter().map(|l| l.to_string()).collect();
        }
    }

    async fn set_sample(&self, reference: &str, sample: StatsSample) {
        let mut containers = self.containers.lock().await;
        if let Some(container) = containers.iter_mut().find(|c| refers_to(c, reference)) {
            container.sample = Some(sample);
        }
    }

    async fn find(&self, reference: &str) -> GatewayResult<FakeContainer> {
        self.containers
            .lock()
            .await
            .iter()
            .find(|c| refers_to(c, reference))
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("No such container: {reference}")))
    }
}

fn refers_to(container: &FakeContainer, reference: &str) -> bool {
    !reference.is_empty() && container.id.starts_with(reference)
}

#[async_trait]
impl RuntimeGateway for FakeRuntime {
    async fn create(&self, spec: ContainerSpec) -> GatewayResult<String> {
        self.check_available().await?;
        let mut containers = self.containers.lock().await;
        let id = format!("c{:011x}{}", containers.len() + 1, "a".repeat(52));
        containers.push(FakeContainer {
            id: id.clone(),
            spec,
            created: now_rfc3339(),
            state: RawState {
                status: "created".to_string(),
                started_at: "0001-01-01T00:00:00Z".to_string(),
                finished_at: "0001-01-01T00:00:00Z".to_string(),
                ..Default::default()
            },
            logs: Vec::new(),
            sample: None,
        });
        Ok(id)
    }

    async fn start(&self, container_id: &str) -> GatewayResult<()> {
        self.check_available().await?;
        if self.behavior.read().await.fail_start {
            return Err(GatewayError::Rejected {
                status: 500,
                message: "exec: \"--config\": executable file not found in $PATH".to_string(),
            });
        }
        let mut containers = self.containers.lock().await;
        let container = containers
            .iter_mut()
            .find(|c| c.id == container_id)
            .ok_or_else(|| GatewayError::NotFound(container_id.to_string()))?;
        container.state.running = true;
        container.state.status = "running".to_string();
        container.state.started_at = now_rfc3339();
        Ok(())
    }

    async fn stop(&self, reference: &str, grace: Duration) -> GatewayResult<()> {
        self.check_available().await?;
        self.calls
            .lock()
            .await
            .push(Call::Stop(reference.to_string(), grace));
        if self.behavior.read().await.fail_stop {
            return Err(GatewayError::Rejected {
                status: 500,
                message: "cannot kill container".to_string(),
            });
        }
        let mut containers = self.containers.lock().await;
        let container = containers
            .iter_mut()
            .find(|c| refers_to(c, reference))
            .ok_or_else(|| GatewayError::NotFound(reference.to_string()))?;
        if container.state.running {
            container.state.running = false;
            container.state.status = "exited".to_string();
            container.state.exit_code = 143;
            container.state.finished_at = now_rfc3339();
        }
        Ok(())
    }

    async fn remove(
        &self,
        reference: &str,
        force: bool,
        remove_volumes: bool,
    ) -> GatewayResult<()> {
        self.check_available().await?;
        self.calls.lock().await.push(Call::Remove {
            reference: reference.to_string(),
            force,
            remove_volumes,
        });
        let mut containers = self.containers.lock().await;
        let index = containers
            .iter()
            .position(|c| refers_to(c, reference))
            .ok_or_else(|| GatewayError::NotFound(reference.to_string()))?;
        if containers[index].state.running && !force {
            return Err(GatewayError::Rejected {
                status: 409,
                message: "cannot remove a running container, stop it first or force".to_string(),
            });
        }
        containers.remove(index);
        Ok(())
    }

    async fn inspect(&self, reference: &str) -> GatewayResult<ContainerDetails> {
        self.check_available().await?;
        let container = self.find(reference).await?;
        Ok(ContainerDetails {
            id: container.id,
            created: container.created,
            state: container.state,
            config: ContainerConfigView {
                image: container.spec.image,
                labels: container.spec.labels,
                cmd: container.spec.cmd,
                env: container.spec.env,
            },
            host_config: HostConfigView {
                binds: container.spec.binds,
            },
        })
    }

    async fn list(&self, label_filter: &str) -> GatewayResult<Vec<ContainerListing>> {
        self.check_available().await?;
        let ignore_filters = self.behavior.read().await.ignore_filters;
        let (key, value) = label_filter
            .split_once('=')
            .unwrap_or((label_filter, ""));
        let containers = self.containers.lock().await;
        Ok(containers
            .iter()
            .filter(|c| ignore_filters || c.spec.labels.get(key).map(String::as_str) == Some(value))
            .map(|c| ContainerListing {
                id: c.id.clone(),
                image: c.spec.image.clone(),
                created: Utc::now().timestamp(),
                labels: c.spec.labels.clone(),
                state: c.state.status.clone(),
                status: format!("Status {}", c.state.status),
            })
            .collect())
    }

    async fn stats(&self, reference: &str) -> GatewayResult<Option<StatsSample>> {
        self.check_available().await?;
        Ok(self.find(reference).await?.sample)
    }

    async fn logs(&self, reference: &str, request: LogRequest) -> GatewayResult<LogStream> {
        self.check_available().await?;
        let container = self.find(reference).await?;
        self.calls
            .lock()
            .await
            .push(Call::Logs(reference.to_string(), request));
        let skip = container.logs.len().saturating_sub(request.tail);
        let chunks: Vec<GatewayResult<Bytes>> = container
            .logs
            .into_iter()
            .skip(skip)
            .map(|line| Ok(Bytes::from(format!("{line}\n"))))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

fn adapter(runtime: &FakeRuntime) -> LifecycleAdapter {
    init_tracing();
    LifecycleAdapter::new(Arc::new(runtime.clone()), AdapterOptions::default())
}

fn launch_config(name: Option<&str>) -> SimulationConfig {
    SimulationConfig {
        name: name.map(str::to_string),
        config_path: "/app/configs/simulation.json".to_string(),
        metrics_path: "/app/configs/metrics.json".to_string(),
        server_path: "/app/configs/server.json".to_string(),
        image: "autobox-engine:latest".to_string(),
        environment: BTreeMap::from([("OPENAI_API_KEY".to_string(), "sk-test".to_string())]),
        volumes: vec!["/home/me/.autobox/configs:/app/configs".to_string()],
    }
}

#[tokio::test]
async fn test_launch_then_inspect_keeps_name() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);

    let launched = adapter.launch(launch_config(Some("demo"))).await?;
    assert_eq!(launched.name, "demo");
    assert_eq!(launched.id.len(), 12);
    assert!(launched.container_id.starts_with(&launched.id));

    let inspected = adapter.inspect(&launched.id).await?;
    assert_eq!(inspected.name, "demo");
    assert_eq!(inspected.container_id, launched.container_id);
    assert_eq!(inspected.config.name.as_deref(), Some("demo"));
    Ok(())
}

#[tokio::test]
async fn test_launch_without_name_runs_until_inspected() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);

    let launched = adapter.launch(launch_config(None)).await?;
    assert_eq!(launched.status, SimulationStatus::Running);
    assert!(launched.started_at.is_some());
    assert!(launched.finished_at.is_none());
    assert_eq!(launched.name, "/app/configs/simulation.json");

    let inspected = adapter.inspect(&launched.container_id).await?;
    assert_eq!(inspected.status, SimulationStatus::Running);
    assert!(inspected.started_at.is_some());
    assert!(inspected.finished_at.is_none());
    assert_eq!(inspected.config, launched.config);
    Ok(())
}

#[tokio::test]
async fn test_launch_writes_labels_args_and_mounts() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    let launched = adapter.launch(launch_config(Some("demo"))).await?;

    let container = runtime.find(&launched.container_id).await?;
    let labels = &container.spec.labels;
    assert_eq!(labels["com.autobox.simulation"], "true");
    assert_eq!(labels["com.autobox.name"], "demo");
    assert_eq!(labels["com.autobox.config_path"], "/app/configs/simulation.json");
    assert!(labels["com.autobox.created_at"].ends_with('Z'));
    assert_eq!(
        container.spec.cmd,
        vec![
            "--config",
            "/app/configs/simulation.json",
            "--metrics",
            "/app/configs/metrics.json",
            "--server",
            "/app/configs/server.json",
        ]
    );
    assert_eq!(container.spec.env, vec!["OPENAI_API_KEY=sk-test"]);
    assert_eq!(container.spec.binds, vec!["/home/me/.autobox/configs:/app/configs"]);
    Ok(())
}

#[tokio::test]
async fn test_launch_rejects_empty_image() {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    let mut config = launch_config(None);
    config.image = "  ".to_string();

    let err = adapter.launch(config).await.unwrap_err();
    assert!(matches!(err, ExecutorError::CreateFailed { .. }));
    assert_eq!(runtime.container_count().await, 0);
}

#[tokio::test]
async fn test_start_failure_leaves_container_behind() {
    let runtime = FakeRuntime::default();
    runtime
        .set_behavior(FakeBehavior {
            fail_start: true,
            ..Default::default()
        })
        .await;
    let adapter = adapter(&runtime);

    let err = adapter.launch(launch_config(None)).await.unwrap_err();
    let ExecutorError::StartFailed { container_id, .. } = err else {
        panic!("expected StartFailed, got {err:?}");
    };
    assert_eq!(runtime.container_count().await, 1);

    let leftover = adapter.inspect(&container_id).await.unwrap();
    assert_eq!(leftover.status, SimulationStatus::Pending);
    assert!(leftover.started_at.is_none());
}

#[tokio::test]
async fn test_unreachable_runtime() {
    let runtime = FakeRuntime::default();
    runtime
        .set_behavior(FakeBehavior {
            unavailable: true,
            ..Default::default()
        })
        .await;
    let adapter = adapter(&runtime);

    assert!(matches!(
        adapter.launch(launch_config(None)).await,
        Err(ExecutorError::RuntimeUnavailable { .. })
    ));
    assert!(matches!(
        adapter.list().await,
        Err(ExecutorError::RuntimeUnavailable { .. })
    ));
    assert!(matches!(
        adapter.stop("abc").await,
        Err(ExecutorError::RuntimeUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_exit_code_zero_completes_in_inspect_and_list() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    let launched = adapter.launch(launch_config(Some("demo"))).await?;

    runtime.exit(&launched.container_id, 0).await;

    let inspected = adapter.inspect(&launched.id).await?;
    assert_eq!(inspected.status, SimulationStatus::Completed);
    assert!(inspected.finished_at.is_some());

    let listed = adapter.list().await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, SimulationStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_list_is_coarser_than_inspect_for_failures() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    let launched = adapter.launch(launch_config(Some("demo"))).await?;

    runtime.exit(&launched.container_id, 2).await;

    assert_eq!(
        adapter.inspect(&launched.id).await?.status,
        SimulationStatus::Failed
    );
    assert_eq!(adapter.list().await?[0].status, SimulationStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_list_excludes_unmanaged_containers() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    adapter.launch(launch_config(Some("managed"))).await?;

    runtime
        .seed(
            "ffff00000000aaaa",
            &[("com.autobox.name", "impostor"), ("com.autobox.simulation", "false")],
            RawState::default(),
        )
        .await;
    runtime
        .seed(
            "eeee00000000bbbb",
            &[("com.autobox.name", "no-marker")],
            RawState::default(),
        )
        .await;

    let names: Vec<String> = adapter.list().await?.into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["managed"]);

    // Still excluded when the runtime ignores the label filter.
    runtime
        .set_behavior(FakeBehavior {
            ignore_filters: true,
            ..Default::default()
        })
        .await;
    let names: Vec<String> = adapter.list().await?.into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["managed"]);
    Ok(())
}

#[tokio::test]
async fn test_list_includes_stopped_simulations() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    let first = adapter.launch(launch_config(Some("first"))).await?;
    adapter.launch(launch_config(Some("second"))).await?;

    adapter.stop(&first.id).await?;

    let listed = adapter.list().await?;
    assert_eq!(listed.len(), 2);
    let first = listed.iter().find(|s| s.name == "first").unwrap();
    assert_eq!(first.status, SimulationStatus::Completed);
    let second = listed.iter().find(|s| s.name == "second").unwrap();
    assert_eq!(second.status, SimulationStatus::Running);
    assert_eq!(second.config.config_path, "/app/configs/simulation.json");
    Ok(())
}

#[tokio::test]
async fn test_stop_uses_configured_grace_period() -> Result<()> {
    let runtime = FakeRuntime::default();
    init_tracing();
    let adapter = LifecycleAdapter::new(
        Arc::new(runtime.clone()),
        AdapterOptions {
            stop_grace_period: Duration::from_secs(3),
            ..Default::default()
        },
    );
    let launched = adapter.launch(launch_config(None)).await?;

    adapter.stop(&launched.id).await?;
    // Stopping again is not an error.
    adapter.stop(&launched.id).await?;

    let calls = runtime.calls.lock().await;
    assert_eq!(
        calls[0],
        Call::Stop(launched.id.clone(), Duration::from_secs(3))
    );
    assert_eq!(calls.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_stop_missing_container_is_not_found() {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    match adapter.stop("deadbeef").await {
        Err(ExecutorError::NotFound { reference, .. }) => assert_eq!(reference, "deadbeef"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_force_remove_of_stopped_container() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    let launched = adapter.launch(launch_config(None)).await?;
    runtime.exit(&launched.container_id, 0).await;

    adapter.remove(&launched.id, true).await?;
    assert_eq!(runtime.container_count().await, 0);

    let calls = runtime.calls.lock().await;
    assert_eq!(
        calls[0],
        Call::Stop(launched.id.clone(), Duration::from_secs(10))
    );
    assert_eq!(
        calls[1],
        Call::Remove {
            reference: launched.id.clone(),
            force: true,
            remove_volumes: true,
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_force_remove_ignores_failed_preliminary_stop() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    runtime
        .seed(
            "0123456789abcdef",
            &[("com.autobox.simulation", "true")],
            RawState {
                status: "exited".to_string(),
                ..Default::default()
            },
        )
        .await;
    runtime
        .set_behavior(FakeBehavior {
            fail_stop: true,
            ..Default::default()
        })
        .await;

    adapter.remove("0123456789ab", true).await?;
    assert_eq!(runtime.container_count().await, 0);

    assert!(matches!(
        adapter.remove("0123456789ab", true).await,
        Err(ExecutorError::RemoveFailed { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_remove_running_container_requires_force() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    let launched = adapter.launch(launch_config(None)).await?;

    let err = adapter.remove(&launched.id, false).await.unwrap_err();
    assert!(matches!(err, ExecutorError::RemoveFailed { .. }));
    assert_eq!(runtime.container_count().await, 1);
    assert!(runtime
        .calls
        .lock()
        .await
        .iter()
        .all(|call| !matches!(call, Call::Stop(..))));

    adapter.remove(&launched.id, true).await?;
    assert_eq!(runtime.container_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_missing_container_queries() {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);

    assert!(matches!(
        adapter.inspect("nope").await,
        Err(ExecutorError::NotFound { .. })
    ));
    assert!(matches!(
        adapter.metrics("nope").await,
        Err(ExecutorError::NotFound { .. })
    ));
    assert!(matches!(
        adapter.read_logs("nope", 10).await,
        Err(ExecutorError::NotFound { .. })
    ));
    assert!(matches!(
        adapter.stream_logs("nope", 10).await,
        Err(ExecutorError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_read_logs_returns_tail() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    let launched = adapter.launch(launch_config(None)).await?;
    runtime
        .set_logs(
            &launched.container_id,
            &[
                "2024-05-01T12:00:00Z booting",
                "2024-05-01T12:00:01Z step 1",
                "2024-05-01T12:00:02Z step 2",
            ],
        )
        .await;

    let text = adapter.read_logs(&launched.id, 2).await?;
    assert_eq!(
        text,
        "2024-05-01T12:00:01Z step 1\n2024-05-01T12:00:02Z step 2\n"
    );

    let calls = runtime.calls.lock().await;
    assert_eq!(
        calls.last(),
        Some(&Call::Logs(launched.id.clone(), LogRequest::snapshot(2)))
    );
    Ok(())
}

#[tokio::test]
async fn test_stream_logs_follows() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    let launched = adapter.launch(launch_config(None)).await?;
    runtime
        .set_logs(&launched.container_id, &["one", "two", "three"])
        .await;

    let mut stream = adapter.stream_logs(&launched.id, 5).await?;
    let mut lines = Vec::new();
    while let Some(chunk) = stream.next().await {
        lines.push(String::from_utf8(chunk?.to_vec())?);
    }
    drop(stream);
    assert_eq!(lines, vec!["one\n", "two\n", "three\n"]);

    let calls = runtime.calls.lock().await;
    let Some(Call::Logs(_, request)) = calls.last() else {
        panic!("expected a log request");
    };
    assert!(request.follow);
    assert!(request.timestamps);
    assert_eq!(request.tail, 5);
    Ok(())
}

#[tokio::test]
async fn test_metrics_from_sample() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    let launched = adapter.launch(launch_config(None)).await?;

    let mut sample = StatsSample::default();
    sample.memory_stats = MemoryStats {
        usage: 50,
        limit: 200,
    };
    sample.networks = HashMap::from([(
        "eth0".to_string(),
        InterfaceStats {
            rx_bytes: 1024,
            rx_packets: 4,
            tx_bytes: 2048,
            tx_packets: 8,
        },
    )]);
    runtime.set_sample(&launched.container_id, sample).await;

    let before = Utc::now();
    let metrics = adapter.metrics(&launched.id).await?;
    assert_eq!(metrics.cpu_usage, 0.0);
    assert_eq!(metrics.memory_usage, 25.0);
    assert_eq!(metrics.network_io.bytes_received, 1024);
    assert_eq!(metrics.network_io.packets_transmitted, 8);
    assert!(metrics.timestamp >= before);
    Ok(())
}

#[tokio::test]
async fn test_metrics_without_sample_is_zeroed() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);
    let launched = adapter.launch(launch_config(None)).await?;

    let metrics = adapter.metrics(&launched.id).await?;
    assert_eq!(metrics.cpu_usage, 0.0);
    assert_eq!(metrics.memory_usage, 0.0);
    assert_eq!(metrics.disk_io.bytes_read, 0);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_launches() -> Result<()> {
    let runtime = FakeRuntime::default();
    let adapter = adapter(&runtime);

    let mut handles = Vec::new();
    for i in 0..8 {
        let adapter = adapter.clone();
        handles.push(tokio::spawn(async move {
            adapter
                .launch(launch_config(Some(&format!("sim-{i}"))))
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await??.container_id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(adapter.list().await?.len(), 8);
    Ok(())
}
