// ABOUTME: Deployment pipeline: state machine, single-flight guard, build log, and status.
// ABOUTME: One pipeline per daemon; every container mutation goes through it.

mod error;
mod guard;
pub mod log;
#[allow(clippy::module_inception)]
mod pipeline;
mod state;
mod status;

pub use error::{PipelineError, PipelineErrorKind};
pub use guard::{DeployGuard, GuardInfo, GuardToken};
pub use log::BuildLog;
pub use pipeline::{DeploymentHandle, Pipeline, ResetReport, WebhookOutcome};
pub use state::{DeploymentRecord, PipelineState, RecordedError, Snapshot, Trigger};
pub use status::{ContainerStatus, StatusReport};
