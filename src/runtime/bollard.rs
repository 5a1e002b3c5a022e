// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Talks to the local Docker or Podman socket through the Docker-compatible API.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerInfo, ContainerOps, ContainerState,
    ContainerSummary, ImageError, ImageOps, LogError, LogLine, LogOps, LogOptions, LogSink,
    LogStream, RestartPolicyConfig, RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
};
use crate::runtime::detection::{RuntimeSocket, RuntimeType};
use crate::types::{ContainerId, ImageId, ImageRef};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{
    ContainerCreateBody, HostConfig, Mount, MountTypeEnum, RestartPolicy, RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    BuildImageOptions, CommitContainerOptions, CreateContainerOptions, CreateImageOptions,
    InspectContainerOptions, KillContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, RemoveImageOptions, StopContainerOptions, WaitContainerOptions,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use http_body_util::{Either, Full};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

/// Seconds bollard waits on a single API request.
const REQUEST_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn status_of(e: &bollard::errors::Error) -> Option<(u16, &str)> {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.as_str())),
        _ => None,
    }
}

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::ImageNotFound(message.to_string()),
        Some((409, message)) => ContainerError::AlreadyExists(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((304, message)) => ContainerError::AlreadyRunning(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_stop_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        // 304 from stop, 409 from kill: the container is not running.
        Some((304 | 409, message)) => ContainerError::NotRunning(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match status_of(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_image_remove_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match status_of(&e) {
        Some((404, _)) => ImageError::NotFound(image_name.to_string()),
        Some((409, message)) => ImageError::InUse(message.to_string()),
        _ => ImageError::Runtime(format!("failed to remove {}: {}", image_name, e)),
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime implementation using bollard.
///
/// Works against Docker and Podman alike via the Docker-compatible API.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to the runtime listening on a detected socket.
    ///
    /// Use with `detect_local()` or `resolve_socket()`.
    pub fn connect(socket: &RuntimeSocket) -> Result<Self, RuntimeInfoError> {
        let client = Docker::connect_with_unix(
            &socket.socket_path,
            REQUEST_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| RuntimeInfoError::Unreachable(e.to_string()))?;
        Ok(Self::new(client, socket.runtime_type))
    }

    /// Get the runtime type (Docker or Podman).
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    async fn image_id(&self, reference: &ImageRef) -> Result<ImageId, ImageError> {
        let name = reference.to_string();
        let details = self
            .client
            .inspect_image(&name)
            .await
            .map_err(|e| ImageError::Runtime(format!("failed to inspect {}: {}", name, e)))?;
        Ok(ImageId::new(details.id.unwrap_or(name)))
    }
}

/// Split a chunk of tool output into lines and hand each to the sink.
fn write_chunk(sink: &dyn LogSink, chunk: &str) {
    for line in chunk.lines() {
        let line = line.trim_end();
        if !line.is_empty() {
            sink.write_line(line);
        }
    }
}

impl Sealed for BollardRuntime {}

#[async_trait]
impl RuntimeInfo for BollardRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| RuntimeInfoError::Unreachable(e.to_string()))?;

        Ok(RuntimeMetadata {
            name: self.runtime_type.to_string(),
            version: info.server_version.unwrap_or_default(),
            os: info.operating_system.unwrap_or_default(),
            arch: info.architecture.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.client
            .ping()
            .await
            .map_err(|e| RuntimeInfoError::Unreachable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn pull_image(
        &self,
        reference: &ImageRef,
        sink: &dyn LogSink,
    ) -> Result<(), ImageError> {
        let image_name = reference.to_string();
        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            let info = result.map_err(|e| ImageError::PullFailed(format!("{}: {}", image_name, e)))?;
            // Per-layer progress is noise; only whole-image status lines are kept.
            if info.id.is_none()
                && let Some(status) = info.status
            {
                write_chunk(sink, &status);
            }
        }

        Ok(())
    }

    async fn build_image(
        &self,
        tag: &ImageRef,
        context: Vec<u8>,
        sink: &dyn LogSink,
    ) -> Result<ImageId, ImageError> {
        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: Some(tag.to_string()),
            ..Default::default()
        };

        let body = Either::Left(Full::new(Bytes::from(context)));
        let mut stream = self.client.build_image(options, None, Some(body));

        while let Some(result) = stream.next().await {
            let output = result.map_err(|e| ImageError::BuildFailed(e.to_string()))?;
            if let Some(chunk) = output.stream {
                write_chunk(sink, &chunk);
            }
            if let Some(detail) = output.error_detail {
                let message = detail
                    .message
                    .unwrap_or_else(|| "image build reported an error".to_string());
                sink.write_line(&message);
                return Err(ImageError::BuildFailed(message));
            }
        }

        self.image_id(tag).await
    }

    async fn commit_container(
        &self,
        container: &ContainerId,
        tag: &ImageRef,
    ) -> Result<ImageId, ImageError> {
        let opts = CommitContainerOptions {
            container: Some(container.to_string()),
            repo: Some(tag.repository()),
            tag: tag.tag().map(str::to_string),
            ..Default::default()
        };

        let response = self
            .client
            .commit_container(opts, bollard::models::ContainerConfig::default())
            .await
            .map_err(|e| ImageError::CommitFailed(format!("{}: {}", container, e)))?;

        Ok(ImageId::new(response.id))
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let image_name = reference.to_string();

        match self.client.inspect_image(&image_name).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ImageError::Runtime(format!(
                "failed to inspect {}: {}",
                image_name, e
            ))),
        }
    }

    async fn remove_image(&self, reference: &ImageRef, force: bool) -> Result<(), ImageError> {
        let image_name = reference.to_string();
        let opts = RemoveImageOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_image(&image_name, Some(opts), None)
            .await
            .map_err(|e| map_image_remove_error(e, &image_name))?;

        Ok(())
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let env: Vec<String> = config
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let restart_name = match config.restart_policy {
            RestartPolicyConfig::No => RestartPolicyNameEnum::NO,
            RestartPolicyConfig::Always => RestartPolicyNameEnum::ALWAYS,
            RestartPolicyConfig::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
        };

        let mounts: Vec<Mount> = config
            .volumes
            .iter()
            .map(|m| Mount {
                source: Some(m.source.clone()),
                target: Some(m.target.clone()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(m.read_only),
                ..Default::default()
            })
            .collect();

        let host_config = HostConfig {
            restart_policy: Some(RestartPolicy {
                name: Some(restart_name),
                maximum_retry_count: None,
            }),
            mounts: if mounts.is_empty() { None } else { Some(mounts) },
            publish_all_ports: Some(config.publish_all_ports),
            ..Default::default()
        };

        let exposed_ports: Vec<String> = config
            .exposed_ports
            .iter()
            .map(|p| format!("{}/tcp", p))
            .collect();

        let body = ContainerCreateBody {
            image: Some(config.image.to_string()),
            env: if env.is_empty() { None } else { Some(env) },
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            cmd: config.command.clone(),
            entrypoint: config.entrypoint.clone(),
            working_dir: config.working_dir.clone(),
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            host_config: Some(host_config),
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(config.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn kill_container(&self, id: &ContainerId, signal: &str) -> Result<(), ContainerError> {
        let opts = KillContainerOptions {
            signal: signal.to_string(),
        };

        self.client
            .kill_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        use bollard::models::ContainerStateStatusEnum as Status;

        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let state = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| match s {
                Status::CREATED => ContainerState::Created,
                Status::RUNNING => ContainerState::Running,
                Status::PAUSED => ContainerState::Paused,
                Status::RESTARTING => ContainerState::Restarting,
                Status::REMOVING => ContainerState::Removing,
                Status::DEAD => ContainerState::Dead,
                _ => ContainerState::Exited,
            })
            .unwrap_or(ContainerState::Exited);

        let exit_code = match state {
            ContainerState::Exited | ContainerState::Dead => {
                details.state.as_ref().and_then(|s| s.exit_code)
            }
            _ => None,
        };

        Ok(ContainerInfo {
            id: id.clone(),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            state,
            exit_code,
            labels: details.config.and_then(|c| c.labels).unwrap_or_default(),
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        if let Some(ref name) = filters.name {
            filter_map.insert("name".to_string(), vec![name.clone()]);
        }

        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        // Podman reports a transient "stopping" state that bollard cannot
        // deserialize; containers being killed underneath us hit it often.
        let mut last_error = None;
        for attempt in 0..3 {
            match self.client.list_containers(Some(opts.clone())).await {
                Ok(containers) => {
                    return Ok(containers
                        .into_iter()
                        .map(|c| {
                            let name = c
                                .names
                                .unwrap_or_default()
                                .first()
                                .map(|n| n.trim_start_matches('/').to_string())
                                .unwrap_or_default();

                            ContainerSummary {
                                id: ContainerId::new(c.id.unwrap_or_default()),
                                name,
                                image: c.image.unwrap_or_default(),
                                state: c
                                    .state
                                    .map(|s| format!("{:?}", s).to_lowercase())
                                    .unwrap_or_default(),
                                status: c.status.unwrap_or_default(),
                                labels: c.labels.unwrap_or_default(),
                            }
                        })
                        .collect());
                }
                Err(e) => {
                    let err_str = e.to_string();
                    if (err_str.contains("unknown variant `stopping`")
                        || err_str.contains("unknown variant `stopped`"))
                        && attempt < 2
                    {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        last_error = Some(err_str);
                        continue;
                    }
                    return Err(ContainerError::Runtime(err_str));
                }
            }
        }

        Err(ContainerError::Runtime(
            last_error.unwrap_or_else(|| "list_containers failed".to_string()),
        ))
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        let opts = WaitContainerOptions {
            condition: "not-running".to_string(),
            ..Default::default()
        };

        let mut stream = self.client.wait_container(id.as_str(), Some(opts));
        let mut exit_code = None;
        while let Some(result) = stream.next().await {
            match result {
                Ok(response) => exit_code = Some(response.status_code),
                // bollard reports non-zero exits as an error carrying the code.
                Err(bollard::errors::Error::DockerContainerWaitError { code, .. }) => {
                    exit_code = Some(code)
                }
                Err(e) => return Err(map_container_not_found_error(e)),
            }
        }

        exit_code.ok_or_else(|| {
            ContainerError::Runtime(format!("wait on {} ended without an exit code", id))
        })
    }
}

#[async_trait]
impl LogOps for BollardRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>, LogError> {
        let log_opts = LogsOptions {
            stdout: opts.stdout,
            stderr: opts.stderr,
            follow: opts.follow,
            tail: opts
                .tail
                .map(|n| n.to_string())
                .unwrap_or_else(|| "all".to_string()),
            ..Default::default()
        };

        let stream = self.client.logs(id.as_str(), Some(log_opts));

        let mapped_stream = stream.map(|result| {
            result
                .map(|output| {
                    let (stream, message) = match output {
                        bollard::container::LogOutput::StdErr { message } => {
                            (LogStream::Stderr, message)
                        }
                        bollard::container::LogOutput::StdOut { message }
                        | bollard::container::LogOutput::StdIn { message }
                        | bollard::container::LogOutput::Console { message } => {
                            (LogStream::Stdout, message)
                        }
                    };

                    LogLine {
                        content: String::from_utf8_lossy(&message).to_string(),
                        stream,
                    }
                })
                .map_err(|e| LogError::StreamError(e.to_string()))
        });

        Ok(Box::pin(mapped_stream))
    }
}
