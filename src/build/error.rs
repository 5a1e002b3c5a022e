// ABOUTME: Error types for the builder and its strategies.
// ABOUTME: Build failures carry the stage (pull, build, run) they happened in.

use crate::runtime::{ContainerError, ImageError, RuntimeInfoError};
use serde::Serialize;
use std::fmt;

/// Phase of a strategy a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStage {
    Pull,
    Build,
    Run,
}

impl BuildStage {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildStage::Pull => "pull",
            BuildStage::Build => "build",
            BuildStage::Run => "run",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("unsupported build type: {0}")]
    UnsupportedBuildType(String),

    #[error("failed to stop project containers: {0}")]
    ContainerStopFailed(String),

    #[error("build failed during {stage}: {message}")]
    Failed { stage: BuildStage, message: String },

    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),
}

/// Error kind for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildErrorKind {
    UnsupportedBuildType,
    ContainerStopFailed,
    BuildFailed,
    RuntimeUnavailable,
}

impl BuildError {
    pub fn failed(stage: BuildStage, message: impl fmt::Display) -> Self {
        BuildError::Failed {
            stage,
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> BuildErrorKind {
        match self {
            BuildError::UnsupportedBuildType(_) => BuildErrorKind::UnsupportedBuildType,
            BuildError::ContainerStopFailed(_) => BuildErrorKind::ContainerStopFailed,
            BuildError::Failed { .. } => BuildErrorKind::BuildFailed,
            BuildError::RuntimeUnavailable(_) => BuildErrorKind::RuntimeUnavailable,
        }
    }

    /// Stage tag for failed builds.
    pub fn stage(&self) -> Option<BuildStage> {
        match self {
            BuildError::Failed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<RuntimeInfoError> for BuildError {
    fn from(err: RuntimeInfoError) -> Self {
        BuildError::RuntimeUnavailable(err.to_string())
    }
}

/// Attach a stage to runtime errors.
pub(crate) trait StageExt<T> {
    fn at(self, stage: BuildStage) -> Result<T, BuildError>;
}

impl<T> StageExt<T> for Result<T, ContainerError> {
    fn at(self, stage: BuildStage) -> Result<T, BuildError> {
        self.map_err(|e| BuildError::failed(stage, e))
    }
}

impl<T> StageExt<T> for Result<T, ImageError> {
    fn at(self, stage: BuildStage) -> Result<T, BuildError> {
        self.map_err(|e| BuildError::failed(stage, e))
    }
}
