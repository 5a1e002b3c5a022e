// ABOUTME: Deployment control surface: up, down, status, reset, and webhook ingress.
// ABOUTME: Every failure is classified into a fixed set with documented status codes.

use crate::build::{BuildErrorKind, BuildStage, StopReport};
use crate::config::Config;
use crate::pipeline::{
    ContainerStatus, Pipeline, PipelineError, ResetReport, StatusReport, Trigger, WebhookOutcome,
};
use crate::runtime::Runtime;
use crate::webhook::{self, PushEvent, WebhookError};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("not authorized: {0}")]
    Auth(String),

    #[error("dockhand is not set up: {0}")]
    Setup(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ConcurrentDeployment(String),

    /// Detail is logged, not returned.
    #[error("{}", internal_message(.stage))]
    Internal { stage: Option<BuildStage> },
}

fn internal_message(stage: &Option<BuildStage>) -> String {
    match stage {
        Some(stage) => format!("deployment failed during {}", stage),
        None => "internal error".to_string(),
    }
}

/// Error kind for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlErrorKind {
    Auth,
    Setup,
    NotFound,
    ConcurrentDeployment,
    Internal,
}

impl ControlError {
    pub fn kind(&self) -> ControlErrorKind {
        match self {
            ControlError::Auth(_) => ControlErrorKind::Auth,
            ControlError::Setup(_) => ControlErrorKind::Setup,
            ControlError::NotFound(_) => ControlErrorKind::NotFound,
            ControlError::ConcurrentDeployment(_) => ControlErrorKind::ConcurrentDeployment,
            ControlError::Internal { .. } => ControlErrorKind::Internal,
        }
    }

    /// HTTP status an HTTP front end answers with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ControlErrorKind::Auth => 403,
            ControlErrorKind::Setup => 412,
            ControlErrorKind::NotFound => 404,
            ControlErrorKind::ConcurrentDeployment => 409,
            ControlErrorKind::Internal => 500,
        }
    }
}

impl From<PipelineError> for ControlError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::ConcurrentDeployment { .. } | PipelineError::Superseded => {
                ControlError::ConcurrentDeployment(err.to_string())
            }
            PipelineError::NotFound(message) => ControlError::NotFound(message),
            PipelineError::Build(e) if e.kind() == BuildErrorKind::UnsupportedBuildType => {
                ControlError::Setup(e.to_string())
            }
            PipelineError::Build(e) => {
                error!(error = %e, "deployment failed");
                ControlError::Internal { stage: e.stage() }
            }
            PipelineError::Internal(message) => {
                error!(error = %message, "deployment task failed");
                ControlError::Internal { stage: None }
            }
        }
    }
}

/// Result of `up`.
#[derive(Debug)]
pub enum UpOutcome {
    /// The run was started and left going.
    Started,
    /// The run finished and these containers are running.
    Up(Vec<ContainerStatus>),
}

/// Answer to a webhook delivery.
#[derive(Debug)]
pub enum WebhookReply {
    Handled(WebhookOutcome),
    /// Unsupported event or malformed payload. Nothing was triggered.
    Rejected(WebhookError),
}

impl WebhookReply {
    /// HTTP status for the provider: rejections are client errors, everything
    /// else is an acknowledgement.
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookReply::Handled(outcome) if outcome.is_started() => 202,
            WebhookReply::Handled(_) => 200,
            WebhookReply::Rejected(_) => 400,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            WebhookReply::Handled(outcome) => outcome.summary(),
            WebhookReply::Rejected(e) => format!("rejected: {}", e),
        }
    }
}

/// The operations a CLI or HTTP front end drives.
pub struct ControlSurface<R> {
    pipeline: Result<Pipeline<R>, String>,
}

impl<R: Runtime + 'static> ControlSurface<R> {
    /// Validate `config` and build the pipeline. An incomplete config gives a
    /// surface that answers every call with [`ControlError::Setup`].
    pub fn new(runtime: Arc<R>, config: &Config) -> Self {
        match config.validate() {
            Ok(settings) => Self::from_pipeline(Pipeline::new(runtime, Arc::new(settings))),
            Err(e) => {
                warn!(error = %e, "configuration incomplete");
                Self::unconfigured(e.to_string())
            }
        }
    }

    pub fn from_pipeline(pipeline: Pipeline<R>) -> Self {
        Self {
            pipeline: Ok(pipeline),
        }
    }

    pub fn unconfigured(reason: impl Into<String>) -> Self {
        Self {
            pipeline: Err(reason.into()),
        }
    }

    pub fn pipeline(&self) -> Result<&Pipeline<R>, ControlError> {
        self.pipeline
            .as_ref()
            .map_err(|reason| ControlError::Setup(reason.clone()))
    }

    /// Build and start the project. With `wait`, returns once it is up.
    pub async fn up(&self, wait: bool) -> Result<UpOutcome, ControlError> {
        let handle = self.pipeline()?.trigger(Trigger::Manual)?;
        if !wait {
            return Ok(UpOutcome::Started);
        }
        let running = handle.wait().await?;
        Ok(UpOutcome::Up(running.iter().map(ContainerStatus::from).collect()))
    }

    pub async fn down(&self) -> Result<StopReport, ControlError> {
        Ok(self.pipeline()?.down().await?)
    }

    pub async fn status(&self) -> Result<StatusReport, ControlError> {
        Ok(self.pipeline()?.status().await)
    }

    pub async fn reset(&self) -> Result<ResetReport, ControlError> {
        Ok(self.pipeline()?.reset().await)
    }

    /// Handle a delivery whose signature the caller has already checked.
    pub fn webhook<'a, I>(&self, headers: I, payload: &[u8]) -> Result<WebhookReply, ControlError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let pipeline = self.pipeline()?;
        match webhook::parse(headers, payload) {
            Ok(event) => Ok(WebhookReply::Handled(pipeline.handle_push(&event))),
            Err(e) => {
                warn!(error = %e, "webhook rejected");
                Ok(WebhookReply::Rejected(e))
            }
        }
    }

    /// Dispatch a push that has already been parsed.
    pub fn push(&self, event: &PushEvent) -> Result<WebhookOutcome, ControlError> {
        Ok(self.pipeline()?.handle_push(event))
    }
}
