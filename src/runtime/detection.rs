// ABOUTME: Runtime socket detection on the daemon's own host.
// ABOUTME: Honours an explicit override, otherwise checks Podman sockets first, then Docker.

use serde::Deserialize;
use std::fmt;
use std::path::Path;

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Which engine serves the socket. Both speak the Docker API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl RuntimeType {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeType::Docker => "docker",
            RuntimeType::Podman => "podman",
        }
    }

    /// System-wide socket path for this engine.
    fn default_socket(self) -> &'static str {
        match self {
            RuntimeType::Docker => DOCKER_SOCKET,
            RuntimeType::Podman => ROOTFUL_PODMAN,
        }
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A socket that exists, and the engine expected behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSocket {
    pub runtime_type: RuntimeType,
    pub socket_path: String,
}

/// The optional `runtime:` block of `dockhand.yml`.
///
/// Setting either field skips detection. A socket without a type is taken
/// to be Docker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuntimeConfig {
    pub runtime: Option<RuntimeType>,
    pub socket: Option<String>,
}

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("configured runtime socket does not exist: {0}")]
    SocketMissing(String),
}

/// Resolve the runtime socket, preferring explicit configuration.
pub fn resolve_socket(config: Option<&RuntimeConfig>) -> Result<RuntimeSocket, DetectionError> {
    let Some(cfg) = config else {
        return detect_local();
    };

    match (cfg.runtime, cfg.socket.as_deref()) {
        (None, None) => detect_local(),
        (runtime, socket) => {
            let runtime_type = runtime.unwrap_or(RuntimeType::Docker);
            let socket_path = socket
                .map(str::to_string)
                .unwrap_or_else(|| runtime_type.default_socket().to_string());
            if !Path::new(&socket_path).exists() {
                return Err(DetectionError::SocketMissing(socket_path));
            }
            Ok(RuntimeSocket {
                runtime_type,
                socket_path,
            })
        }
    }
}

/// Detect the container runtime on the local system.
///
/// Detection order:
/// 1. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
pub fn detect_local() -> Result<RuntimeSocket, DetectionError> {
    let rootless = get_uid().map(|uid| format!("/run/user/{}/podman/podman.sock", uid));

    let candidates = rootless
        .into_iter()
        .map(|path| (RuntimeType::Podman, path))
        .chain([
            (RuntimeType::Podman, ROOTFUL_PODMAN.to_string()),
            (RuntimeType::Docker, DOCKER_SOCKET.to_string()),
        ]);

    for (runtime_type, socket_path) in candidates {
        if Path::new(&socket_path).exists() {
            tracing::debug!("Found {} socket at {}", runtime_type, socket_path);
            return Ok(RuntimeSocket {
                runtime_type,
                socket_path,
            });
        }
    }

    Err(DetectionError::NoRuntimeFound)
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}
