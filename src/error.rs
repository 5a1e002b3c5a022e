// ABOUTME: Application-wide error types for dockhand.
// ABOUTME: Uses thiserror for ergonomic error handling.

use crate::control::{ControlError, ControlErrorKind};
use crate::runtime::RuntimeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required configuration: {0}")]
    MissingConfig(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Control(#[from] ControlError),
}

impl Error {
    /// True when the daemon has not been set up enough to accept work.
    pub fn is_setup(&self) -> bool {
        match self {
            Error::ConfigNotFound(_) | Error::MissingConfig(_) | Error::InvalidConfig(_) => true,
            Error::Control(e) => e.kind() == ControlErrorKind::Setup,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
