// ABOUTME: In-memory container runtime used by unit tests.
// ABOUTME: Records calls, injects failures, and can pause operations at chosen points.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    COMPOSE_PROJECT_LABEL, ContainerConfig, ContainerError, ContainerFilters, ContainerInfo,
    ContainerOps, ContainerState, ContainerSummary, ImageError, ImageOps, LogError, LogLine,
    LogOps, LogOptions, LogSink, LogStream, RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
};
use crate::types::{ContainerId, ImageId, ImageRef};
use async_trait::async_trait;
use futures::Stream;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Operations that can be made to fail or pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Ping,
    Pull,
    Build,
    Commit,
    Create,
    Start,
    Kill,
    List,
    /// One-shot containers exit non-zero.
    Wait,
    /// `up -d` exits zero but leaves nothing running.
    ComposeUpSilent,
}

/// Pauses an operation until released.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub running: bool,
    pub labels: HashMap<String, String>,
}

#[derive(Default)]
struct FakeState {
    containers: Vec<FakeContainer>,
    images: HashSet<String>,
    next_id: u64,
    failures: HashMap<FailPoint, String>,
    gates: HashMap<FailPoint, Arc<Gate>>,
    calls: Vec<String>,
}

impl FakeState {
    fn find(&self, id: &ContainerId) -> Option<usize> {
        self.containers.iter().position(|c| &c.id == id)
    }

    fn fresh_id(&mut self) -> ContainerId {
        self.next_id += 1;
        ContainerId::new(format!("c{:011x}{:052x}", self.next_id, self.next_id))
    }
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_image(&self, image: &str) {
        self.state.lock().images.insert(canonical(image));
    }

    pub fn fail(&self, point: FailPoint, message: &str) {
        self.state.lock().failures.insert(point, message.to_string());
    }

    pub fn clear_failure(&self, point: FailPoint) {
        self.state.lock().failures.remove(&point);
    }

    pub fn gate(&self, point: FailPoint) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.state.lock().gates.insert(point, gate.clone());
        gate
    }

    /// Start a container outside of any builder, as if left by another process.
    pub fn add_running(&self, name: &str, labels: &[(&str, &str)]) -> ContainerId {
        let mut state = self.state.lock();
        let id = state.fresh_id();
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: name.to_string(),
            image: "external:latest".to_string(),
            command: Vec::new(),
            running: true,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        id
    }

    pub fn containers(&self) -> Vec<FakeContainer> {
        self.state.lock().containers.clone()
    }

    pub fn running_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .containers
            .iter()
            .filter(|c| c.running)
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn has_image(&self, image: &str) -> bool {
        self.state.lock().images.contains(&canonical(image))
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.state.lock().calls.push(call);
    }

    fn failure(&self, point: FailPoint) -> Option<String> {
        self.state.lock().failures.get(&point).cloned()
    }

    async fn pass(&self, point: FailPoint) {
        let gate = self.state.lock().gates.remove(&point);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

fn canonical(image: &str) -> String {
    ImageRef::parse(image)
        .map(|r| r.to_string())
        .unwrap_or_else(|_| image.to_string())
}

/// `docker-compose -p <project> up -d` brings up one service container.
fn compose_up_project(command: &[String]) -> Option<String> {
    if !command.iter().any(|a| a == "up") {
        return None;
    }
    let pos = command.iter().position(|a| a == "-p")?;
    command.get(pos + 1).cloned()
}

impl Sealed for FakeRuntime {}

#[async_trait]
impl RuntimeInfo for FakeRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        self.ping().await?;
        Ok(RuntimeMetadata {
            name: "fake".to_string(),
            version: "0.0.0".to_string(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        match self.failure(FailPoint::Ping) {
            Some(message) => Err(RuntimeInfoError::Unreachable(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn pull_image(&self, reference: &ImageRef, sink: &dyn LogSink) -> Result<(), ImageError> {
        self.record(format!("pull {}", reference));
        self.pass(FailPoint::Pull).await;
        if let Some(message) = self.failure(FailPoint::Pull) {
            return Err(ImageError::PullFailed(message));
        }
        sink.write_line(&format!("Pulling from {}", reference.name()));
        sink.write_line(&format!("Status: Downloaded newer image for {}", reference));
        self.state.lock().images.insert(reference.to_string());
        Ok(())
    }

    async fn build_image(
        &self,
        tag: &ImageRef,
        context: Vec<u8>,
        sink: &dyn LogSink,
    ) -> Result<ImageId, ImageError> {
        self.record(format!("build {} ({} bytes)", tag, context.len()));
        sink.write_line("Step 1/2 : FROM alpine");
        self.pass(FailPoint::Build).await;
        if let Some(message) = self.failure(FailPoint::Build) {
            sink.write_line(&message);
            return Err(ImageError::BuildFailed(message));
        }
        sink.write_line(&format!("Successfully tagged {}", tag));
        self.state.lock().images.insert(tag.to_string());
        Ok(ImageId::new(format!("sha256:{}", tag.name())))
    }

    async fn commit_container(
        &self,
        container: &ContainerId,
        tag: &ImageRef,
    ) -> Result<ImageId, ImageError> {
        self.record(format!("commit {} {}", container.short(), tag));
        if let Some(message) = self.failure(FailPoint::Commit) {
            return Err(ImageError::CommitFailed(message));
        }
        let mut state = self.state.lock();
        if state.find(container).is_none() {
            return Err(ImageError::CommitFailed(format!("no such container {}", container)));
        }
        state.images.insert(tag.to_string());
        Ok(ImageId::new(format!("sha256:{}", tag.name())))
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        Ok(self.state.lock().images.contains(&reference.to_string()))
    }

    async fn remove_image(&self, reference: &ImageRef, _force: bool) -> Result<(), ImageError> {
        self.record(format!("rmi {}", reference));
        if self.state.lock().images.remove(&reference.to_string()) {
            Ok(())
        } else {
            Err(ImageError::NotFound(reference.to_string()))
        }
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        self.record(format!("create {}", config.name));
        if let Some(message) = self.failure(FailPoint::Create) {
            return Err(ContainerError::Runtime(message));
        }
        let mut state = self.state.lock();
        if state.containers.iter().any(|c| c.name == config.name) {
            return Err(ContainerError::AlreadyExists(config.name.clone()));
        }
        let image = config.image.to_string();
        if !state.images.contains(&image) {
            return Err(ContainerError::ImageNotFound(image));
        }
        let id = state.fresh_id();
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: config.name.clone(),
            image,
            command: config.command.clone().unwrap_or_default(),
            running: false,
            labels: config.labels.clone(),
        });
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.record(format!("start {}", id.short()));
        self.pass(FailPoint::Start).await;
        if let Some(message) = self.failure(FailPoint::Start) {
            return Err(ContainerError::Runtime(message));
        }
        let silent = self.failure(FailPoint::ComposeUpSilent).is_some();
        let mut state = self.state.lock();
        let idx = state
            .find(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        state.containers[idx].running = true;

        if let Some(project) = compose_up_project(&state.containers[idx].command)
            && !silent
        {
            let name = format!("{}_web_1", project);
            if !state.containers.iter().any(|c| c.name == name) {
                let service_id = state.fresh_id();
                state.containers.push(FakeContainer {
                    id: service_id,
                    name,
                    image: format!("{}_web:latest", project),
                    command: Vec::new(),
                    running: true,
                    labels: HashMap::from([(COMPOSE_PROJECT_LABEL.to_string(), project)]),
                });
            }
        }
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        self.kill_container(id, "SIGTERM").await
    }

    async fn kill_container(&self, id: &ContainerId, signal: &str) -> Result<(), ContainerError> {
        self.record(format!("kill {} {}", id.short(), signal));
        self.pass(FailPoint::Kill).await;
        if let Some(message) = self.failure(FailPoint::Kill) {
            return Err(ContainerError::Runtime(message));
        }
        let mut state = self.state.lock();
        let idx = state
            .find(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if !state.containers[idx].running {
            return Err(ContainerError::NotRunning(id.to_string()));
        }
        state.containers[idx].running = false;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        self.record(format!("rm {}", id.short()));
        let mut state = self.state.lock();
        let idx = state
            .find(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if state.containers[idx].running && !force {
            return Err(ContainerError::Runtime(format!(
                "cannot remove running container {}",
                id
            )));
        }
        state.containers.remove(idx);
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let state = self.state.lock();
        let idx = state
            .find(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        let c = &state.containers[idx];
        Ok(ContainerInfo {
            id: c.id.clone(),
            name: c.name.clone(),
            image: c.image.clone(),
            state: if c.running {
                ContainerState::Running
            } else {
                ContainerState::Exited
            },
            exit_code: if c.running { None } else { Some(0) },
            labels: c.labels.clone(),
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        self.pass(FailPoint::List).await;
        if let Some(message) = self.failure(FailPoint::List) {
            return Err(ContainerError::Runtime(message));
        }
        let state = self.state.lock();
        Ok(state
            .containers
            .iter()
            .filter(|c| filters.all || c.running)
            .filter(|c| filters.name.as_ref().is_none_or(|n| c.name.contains(n.as_str())))
            .filter(|c| {
                filters
                    .labels
                    .iter()
                    .all(|(k, v)| c.labels.get(k) == Some(v))
            })
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
                state: if c.running { "running" } else { "exited" }.to_string(),
                status: if c.running { "Up" } else { "Exited (0)" }.to_string(),
                labels: c.labels.clone(),
            })
            .collect())
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        self.record(format!("wait {}", id.short()));
        self.pass(FailPoint::Wait).await;
        let failed = self.failure(FailPoint::Wait).is_some();
        let mut state = self.state.lock();
        let idx = state
            .find(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        state.containers[idx].running = false;
        Ok(if failed { 1 } else { 0 })
    }
}

#[async_trait]
impl LogOps for FakeRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        _opts: &LogOptions,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>, LogError> {
        let command = {
            let state = self.state.lock();
            let idx = state
                .find(id)
                .ok_or_else(|| LogError::ContainerNotFound(id.to_string()))?;
            state.containers[idx].command.join(" ")
        };
        let failed = self.failure(FailPoint::Wait);
        let mut lines = vec![Ok(LogLine {
            content: format!("running {}\n", command),
            stream: LogStream::Stdout,
        })];
        if let Some(message) = failed {
            lines.push(Ok(LogLine {
                content: format!("{}\n", message),
                stream: LogStream::Stderr,
            }));
        }
        Ok(Box::pin(futures::stream::iter(lines)))
    }
}
