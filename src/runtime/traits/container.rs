// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: Create, start, stop, kill, remove, inspect, list, and wait on containers.

use super::sealed::Sealed;
use super::shared_types::{ContainerConfig, ContainerInfo};
use crate::types::{ContainerId, ProjectName};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Label every container created by the builder carries.
pub const MANAGED_LABEL: &str = "dockhand.managed";
/// Label naming the project a container belongs to.
pub const PROJECT_LABEL: &str = "dockhand.project";
/// Label docker-compose puts on every container of a compose project.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    /// Create a container from the given configuration.
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError>;

    /// Start a created container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stop a running container, killing it after `timeout`.
    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError>;

    /// Send a signal to a running container.
    async fn kill_container(&self, id: &ContainerId, signal: &str) -> Result<(), ContainerError>;

    /// Remove a container.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    /// Get detailed information about a container.
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError>;

    /// List containers matching the given filters.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;

    /// Block until the container exits, returning its exit code.
    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError>;
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Filter by label (key=value).
    pub labels: HashMap<String, String>,
    /// Filter by name (substring match).
    pub name: Option<String>,
    /// Include stopped containers.
    pub all: bool,
}

impl ContainerFilters {
    /// Every running container, regardless of owner.
    pub fn running() -> Self {
        Self::default()
    }

    /// Containers the builder created for `project`.
    pub fn for_project(project: &ProjectName, all: bool) -> Self {
        let mut labels = HashMap::new();
        labels.insert(PROJECT_LABEL.to_string(), project.to_string());
        Self {
            labels,
            name: None,
            all,
        }
    }
}

/// Summary information about a container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSummary {
    /// Container ID.
    pub id: ContainerId,
    /// Container name, without the leading slash.
    pub name: String,
    /// Image used.
    pub image: String,
    /// Current state (`running`, `exited`, ...).
    pub state: String,
    /// Status message.
    pub status: String,
    /// Labels.
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }

    /// Whether this container is named `<project>`, `<project>-*` or
    /// `<project>_*`, or carries one of the project labels.
    pub fn belongs_to(&self, project: &ProjectName) -> bool {
        let name = project.as_str();
        let named = match self.name.strip_prefix(name) {
            Some(rest) => rest.is_empty() || rest.starts_with('-') || rest.starts_with('_'),
            None => false,
        };
        named
            || self.labels.get(PROJECT_LABEL).map(String::as_str) == Some(name)
            || self.labels.get(COMPOSE_PROJECT_LABEL).map(String::as_str) == Some(name)
    }
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ContainerError {
    /// The container is already gone or stopped, which teardown treats as done.
    pub fn is_gone(&self) -> bool {
        matches!(self, ContainerError::NotFound(_) | ContainerError::NotRunning(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str, labels: &[(&str, &str)]) -> ContainerSummary {
        ContainerSummary {
            id: ContainerId::new("abc"),
            name: name.to_string(),
            image: "img".to_string(),
            state: "running".to_string(),
            status: "Up".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn belongs_by_name() {
        let project = ProjectName::new("shop").unwrap();
        assert!(summary("shop_web_1", &[]).belongs_to(&project));
        assert!(!summary("blog_web_1", &[]).belongs_to(&project));
        assert!(summary("shop", &[]).belongs_to(&project));
        assert!(summary("shop-web-1", &[]).belongs_to(&project));
    }

    #[test]
    fn name_containing_project_is_not_enough() {
        let project = ProjectName::new("shop").unwrap();
        assert!(!summary("workshop-db", &[]).belongs_to(&project));
        assert!(!summary("shopfront", &[]).belongs_to(&project));
        assert!(!summary("my_shop_1", &[]).belongs_to(&project));
    }

    #[test]
    fn belongs_by_label() {
        let project = ProjectName::new("shop").unwrap();
        assert!(summary("db", &[(COMPOSE_PROJECT_LABEL, "shop")]).belongs_to(&project));
        assert!(summary("x", &[(PROJECT_LABEL, "shop")]).belongs_to(&project));
        assert!(!summary("x", &[(PROJECT_LABEL, "blog")]).belongs_to(&project));
    }
}
