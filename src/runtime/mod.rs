// ABOUTME: Client for the local container engine (Docker or Podman).
// ABOUTME: Capability traits, the bollard-backed implementation, and socket detection.

mod bollard;
mod detection;
mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod traits;

pub use self::bollard::BollardRuntime;
pub use detection::{
    DetectionError, RuntimeConfig, RuntimeSocket, RuntimeType, detect_local, resolve_socket,
};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;

use snafu::ResultExt;

/// Find the local engine, connect, and check that it answers.
pub async fn connect_local(config: Option<&RuntimeConfig>) -> Result<BollardRuntime, RuntimeError> {
    let socket = resolve_socket(config).context(error::DetectionSnafu)?;
    let runtime = BollardRuntime::connect(&socket).context(error::ConnectionSnafu)?;
    let engine = runtime.info().await.context(error::ConnectionSnafu)?;
    tracing::debug!(engine = %engine, socket = %socket.socket_path, "connected");
    Ok(runtime)
}
