// ABOUTME: Error types for pipeline operations.
// ABOUTME: Concurrency rejections stay distinct from build failures so callers can tell them apart.

use super::guard::GuardInfo;
use super::state::PipelineState;
use crate::build::{BuildError, BuildErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("a deployment is already in progress ({}){}", .state, holder_suffix(.holder))]
    ConcurrentDeployment {
        state: PipelineState,
        holder: Option<GuardInfo>,
    },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("{0}")]
    NotFound(String),

    /// A reset started while this run was in flight.
    #[error("deployment was superseded by a reset")]
    Superseded,

    #[error("deployment task ended unexpectedly: {0}")]
    Internal(String),
}

fn holder_suffix(holder: &Option<GuardInfo>) -> String {
    match holder {
        Some(info) => format!(
            ", held by {} since {}",
            info.operation,
            info.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => String::new(),
    }
}

/// Error kind for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    ConcurrentDeployment,
    Build(BuildErrorKind),
    NotFound,
    Superseded,
    Internal,
}

impl PipelineError {
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            PipelineError::ConcurrentDeployment { .. } => PipelineErrorKind::ConcurrentDeployment,
            PipelineError::Build(e) => PipelineErrorKind::Build(e.kind()),
            PipelineError::NotFound(_) => PipelineErrorKind::NotFound,
            PipelineError::Superseded => PipelineErrorKind::Superseded,
            PipelineError::Internal(_) => PipelineErrorKind::Internal,
        }
    }
}
