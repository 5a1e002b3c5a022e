// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerConfig, VolumeMount, RestartPolicyConfig, ContainerInfo and ContainerState.

use crate::types::{ContainerId, ImageRef};
use std::collections::HashMap;

/// Unix socket build tools use to drive the engine that hosts them.
pub const ENGINE_SOCKET: &str = "/var/run/docker.sock";

/// Configuration for creating a container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Name for the container.
    pub name: String,
    /// Image to run.
    pub image: ImageRef,
    /// Environment variables.
    pub env: HashMap<String, String>,
    /// Labels to apply.
    pub labels: HashMap<String, String>,
    /// Bind mounts.
    pub volumes: Vec<VolumeMount>,
    /// Command to run (overrides image CMD).
    pub command: Option<Vec<String>>,
    /// Entrypoint (overrides image ENTRYPOINT).
    pub entrypoint: Option<Vec<String>>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// Container ports to expose.
    pub exposed_ports: Vec<u16>,
    /// Publish every exposed port on a random host port.
    pub publish_all_ports: bool,
    /// Restart policy.
    pub restart_policy: RestartPolicyConfig,
}

impl ContainerConfig {
    /// A bare config for `image`; callers fill in what they need.
    pub fn new(name: impl Into<String>, image: ImageRef) -> Self {
        Self {
            name: name.into(),
            image,
            env: HashMap::new(),
            labels: HashMap::new(),
            volumes: Vec::new(),
            command: None,
            entrypoint: None,
            working_dir: None,
            exposed_ports: Vec::new(),
            publish_all_ports: false,
            restart_policy: RestartPolicyConfig::No,
        }
    }
}

/// Bind mount configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// Host path.
    pub source: String,
    /// Target path in container.
    pub target: String,
    /// Read-only flag.
    pub read_only: bool,
}

impl VolumeMount {
    pub fn bind(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }
}

/// Restart policy configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RestartPolicyConfig {
    /// Never restart. Build tool containers use this.
    #[default]
    No,
    /// Always restart.
    Always,
    /// Restart unless explicitly stopped. Deployed containers use this.
    UnlessStopped,
}

/// Information about a container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Container ID.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Image used.
    pub image: String,
    /// Current state.
    pub state: ContainerState,
    /// Exit code, once the container has exited.
    pub exit_code: Option<i64>,
    /// Labels.
    pub labels: HashMap<String, String>,
}

/// Container state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}
