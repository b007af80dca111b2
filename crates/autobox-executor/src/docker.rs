use async_trait::async_trait;
use autobox_config::DockerSettings;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, StartContainerOptions, StatsOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::models::{HostConfig, RestartPolicy, RestartPolicyNameEnum};
use bollard::{ClientVersion, Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::gateway::{
    reshape, ContainerDetails, ContainerListing, ContainerSpec, GatewayError, GatewayResult,
    LogRequest, LogStream, RuntimeGateway,
};
use crate::telemetry::StatsSample;

/// [`RuntimeGateway`] backed by the Docker Engine API.
#[derive(Clone)]
pub struct BollardGateway {
    docker: Docker,
}

impl BollardGateway {
    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connect according to the configured host and negotiate the API version.
    #[instrument(skip(settings), fields(host = %settings.host, tls = settings.tls_verify))]
    pub async fn connect(settings: &DockerSettings) -> GatewayResult<Self> {
        let version = client_version(&settings.api_version);
        let host = settings.host.trim();
        let timeout = settings.timeout_secs;

        let docker = if host.starts_with("unix://") {
            Docker::connect_with_socket(host, timeout, &version)?
        } else if settings.tls_verify {
            let certs = settings.cert_path.as_deref().ok_or_else(|| {
                GatewayError::Unavailable("TLS requested without a certificate directory".into())
            })?;
            Docker::connect_with_ssl(
                host,
                &certs.join("key.pem"),
                &certs.join("cert.pem"),
                &certs.join("ca.pem"),
                timeout,
                &version,
            )?
        } else if host.starts_with("tcp://") || host.starts_with("http://") {
            Docker::connect_with_http(host, timeout, &version)?
        } else {
            return Err(GatewayError::Unavailable(format!(
                "unsupported docker host: {host}"
            )));
        };

        let docker = docker.negotiate_version().await?;
        info!("Connected to Docker");
        Ok(Self { docker })
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }
}

/// `"1.41"` to a client version, falling back to bollard's default.
fn client_version(raw: &str) -> ClientVersion {
    let parsed = raw.trim().split_once('.').and_then(|(major, minor)| {
        Some(ClientVersion {
            major_version: major.parse().ok()?,
            minor_version: minor.parse().ok()?,
        })
    });
    parsed.unwrap_or(ClientVersion {
        major_version: API_DEFAULT_VERSION.major_version,
        minor_version: API_DEFAULT_VERSION.minor_version,
    })
}

#[async_trait]
impl RuntimeGateway for BollardGateway {
    async fn create(&self, spec: ContainerSpec) -> GatewayResult<String> {
        let config = Config {
            image: Some(spec.image),
            cmd: Some(spec.cmd),
            env: Some(spec.env),
            labels: Some(spec.labels),
            host_config: Some(HostConfig {
                binds: Some(spec.binds),
                auto_remove: Some(false),
                restart_policy: Some(RestartPolicy {
                    name: Some(RestartPolicyNameEnum::NO),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await?;
        for warning in &response.warnings {
            debug!(container_id = %response.id, %warning, "Docker create warning");
        }
        Ok(response.id)
    }

    async fn start(&self, container_id: &str) -> GatewayResult<()> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop(&self, reference: &str, grace: Duration) -> GatewayResult<()> {
        let options = StopContainerOptions {
            t: i64::try_from(grace.as_secs()).unwrap_or(i64::MAX),
        };
        match self.docker.stop_container(reference, Some(options)).await {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(
        &self,
        reference: &str,
        force: bool,
        remove_volumes: bool,
    ) -> GatewayResult<()> {
        let options = RemoveContainerOptions {
            v: remove_volumes,
            force,
            ..Default::default()
        };
        self.docker.remove_container(reference, Some(options)).await?;
        Ok(())
    }

    async fn inspect(&self, reference: &str) -> GatewayResult<ContainerDetails> {
        let response = self
            .docker
            .inspect_container(reference, None::<InspectContainerOptions>)
            .await?;
        reshape(&response)
    }

    async fn list(&self, label_filter: &str) -> GatewayResult<Vec<ContainerListing>> {
        let filters = HashMap::from([("label".to_string(), vec![label_filter.to_string()])]);
        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };
        let summaries = self.docker.list_containers(Some(options)).await?;
        summaries.iter().map(reshape).collect()
    }

    async fn stats(&self, reference: &str) -> GatewayResult<Option<StatsSample>> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let mut stream = Box::pin(self.docker.stats(reference, Some(options)));
        match stream.next().await {
            None => Ok(None),
            Some(Ok(stats)) => reshape(&stats).map(Some),
            // Empty body: the daemon closed before sending a document.
            Some(Err(BollardError::JsonSerdeError { err })) if err.is_eof() => Ok(None),
            Some(Err(e)) => Err(e.into()),
        }
    }

    async fn logs(&self, reference: &str, request: LogRequest) -> GatewayResult<LogStream> {
        // Surface a missing container now rather than on the first poll.
        self.docker
            .inspect_container(reference, None::<InspectContainerOptions>)
            .await?;

        let options = LogsOptions::<String> {
            follow: request.follow,
            stdout: true,
            stderr: true,
            timestamps: request.timestamps,
            tail: request.tail.to_string(),
            ..Default::default()
        };
        let docker = self.docker.clone();
        let reference = reference.to_string();

        let stream = async_stream::stream! {
            let mut logs = Box::pin(docker.logs(&reference, Some(options)));
            while let Some(entry) = logs.next().await {
                yield match entry {
                    Ok(LogOutput::StdOut { message })
                    | Ok(LogOutput::StdErr { message })
                    | Ok(LogOutput::StdIn { message })
                    | Ok(LogOutput::Console { message }) => Ok(message),
                    Err(e) => Err(GatewayError::from(e)),
                };
            }
        };
        Ok(Box::pin(stream))
    }
}
