// ABOUTME: Engine identity and reachability checks.
// ABOUTME: A failed check means the engine cannot be used at all, not that one operation broke.

use super::sealed::Sealed;
use async_trait::async_trait;
use std::fmt;

#[async_trait]
pub trait RuntimeInfo: Sealed + Send + Sync {
    /// Which engine answers on the socket.
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError>;

    /// Cheap liveness check, run before every build.
    async fn ping(&self) -> Result<(), RuntimeInfoError>;
}

/// The engine on the other end of the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeMetadata {
    /// `docker` or `podman`.
    pub name: String,
    pub version: String,
    pub os: String,
    pub arch: String,
}

impl fmt::Display for RuntimeMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({}/{})", self.name, self.version, self.os, self.arch)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeInfoError {
    #[error("engine unreachable: {0}")]
    Unreachable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_reads_as_one_line() {
        let meta = RuntimeMetadata {
            name: "podman".to_string(),
            version: "5.2.1".to_string(),
            os: "linux".to_string(),
            arch: "amd64".to_string(),
        };
        assert_eq!(meta.to_string(), "podman 5.2.1 (linux/amd64)");
    }
}
