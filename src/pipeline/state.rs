// ABOUTME: Pipeline state machine values and the record of the latest run.
// ABOUTME: Snapshots are plain copies so status reads never observe a half-applied transition.

use crate::build::BuildStage;
use crate::webhook::PushEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    #[default]
    Idle,
    Building,
    Deploying,
    Up,
    Failed,
    Resetting,
}

impl PipelineState {
    /// States during which builds or container mutations are in flight.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            PipelineState::Building | PipelineState::Deploying | PipelineState::Resetting
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Building => "building",
            PipelineState::Deploying => "deploying",
            PipelineState::Up => "up",
            PipelineState::Failed => "failed",
            PipelineState::Resetting => "resetting",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What asked for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Trigger {
    Manual,
    Push(PushEvent),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Manual => f.write_str("manual"),
            Trigger::Push(event) => write!(
                f,
                "{} push to {} ({})",
                event.provider(),
                event.git_ref(),
                event.repository_name()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<BuildStage>,
    pub message: String,
}

/// The latest run. Overwritten when a new run starts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeploymentRecord {
    pub trigger: Option<Trigger>,
    pub build_type: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<RecordedError>,
    /// Kept across runs until a reset.
    pub last_up: Option<DateTime<Utc>>,
    pub containers: Vec<String>,
}

/// State plus record, copied out as a unit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub state: PipelineState,
    pub record: DeploymentRecord,
    /// Bumped by every reset; runs from an older epoch are stale.
    #[serde(skip)]
    pub epoch: u64,
}
