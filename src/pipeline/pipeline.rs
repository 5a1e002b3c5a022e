// ABOUTME: Deployment pipeline: the single-flight state machine driving build, start, stop, and reset.
// ABOUTME: Runs are spawned on tokio; status reads copy a snapshot and never wait on a run.

use super::error::PipelineError;
use super::guard::{DeployGuard, GuardInfo};
use super::log::BuildLog;
use super::state::{DeploymentRecord, PipelineState, RecordedError, Snapshot, Trigger};
use super::status::{ContainerStatus, StatusReport};
use crate::build::{BuildError, Builder, ContainerStopper, ProjectContainerStopper, StopReport};
use crate::config::Settings;
use crate::diagnostics::{Diagnostics, Warning};
use crate::runtime::{ContainerFilters, ContainerSummary, LogSink, Runtime};
use crate::webhook::PushEvent;
use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type RunResult = Result<Vec<ContainerSummary>, PipelineError>;

struct Inner<R> {
    settings: Arc<Settings>,
    runtime: Arc<R>,
    builder: Builder<R>,
    stopper: Arc<dyn ContainerStopper>,
    log: Arc<BuildLog>,
    snapshot: RwLock<Snapshot>,
    guard: DeployGuard,
}

/// The daemon's single deployment pipeline. Clones share state.
pub struct Pipeline<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for Pipeline<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// A spawned run. Dropping it leaves the run going.
#[derive(Debug)]
pub struct DeploymentHandle {
    task: JoinHandle<RunResult>,
}

impl DeploymentHandle {
    /// Wait for the run to reach `Up` or `Failed`.
    pub async fn wait(self) -> RunResult {
        self.task
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?
    }
}

/// What a push delivery led to. None of these is an error for the sender.
#[derive(Debug)]
pub enum WebhookOutcome {
    Started(DeploymentHandle),
    Ignored { reason: String },
    Busy { reason: String },
}

impl WebhookOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, WebhookOutcome::Started(_))
    }

    /// One line for the acknowledgement sent back to the provider.
    pub fn summary(&self) -> String {
        match self {
            WebhookOutcome::Started(_) => "deployment started".to_string(),
            WebhookOutcome::Ignored { reason } => format!("ignored: {}", reason),
            WebhookOutcome::Busy { reason } => format!("busy: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResetReport {
    pub stopped: Vec<String>,
    pub diagnostics: Diagnostics,
}

impl<R: Runtime + 'static> Pipeline<R> {
    pub fn new(runtime: Arc<R>, settings: Arc<Settings>) -> Self {
        let stopper: Arc<dyn ContainerStopper> =
            Arc::new(ProjectContainerStopper::new(runtime.clone(), &settings));
        Self::with_stopper(runtime, settings, stopper)
    }

    pub fn with_stopper(
        runtime: Arc<R>,
        settings: Arc<Settings>,
        stopper: Arc<dyn ContainerStopper>,
    ) -> Self {
        let builder = Builder::new(runtime.clone(), settings.clone(), stopper.clone());
        Self::from_parts(runtime, settings, stopper, builder)
    }

    pub fn from_parts(
        runtime: Arc<R>,
        settings: Arc<Settings>,
        stopper: Arc<dyn ContainerStopper>,
        builder: Builder<R>,
    ) -> Self {
        let log = Arc::new(BuildLog::new(settings.log_tail_lines));
        Self {
            inner: Arc::new(Inner {
                settings,
                runtime,
                builder,
                stopper,
                log,
                snapshot: RwLock::new(Snapshot::default()),
                guard: DeployGuard::default(),
            }),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Build output of the current or most recent run.
    pub fn log(&self) -> &Arc<BuildLog> {
        &self.inner.log
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot.read().clone()
    }

    pub fn state(&self) -> PipelineState {
        self.inner.snapshot.read().state
    }

    /// Start a run from `Idle`, `Up`, or `Failed`.
    ///
    /// The run is spawned; the returned handle can be awaited or dropped.
    /// While another run, stop, or reset holds the pipeline this fails with
    /// [`PipelineError::ConcurrentDeployment`] and the record is untouched.
    pub fn trigger(&self, trigger: Trigger) -> Result<DeploymentHandle, PipelineError> {
        let token = self
            .inner
            .guard
            .try_acquire(GuardInfo::new(trigger.to_string()))
            .map_err(|holder| PipelineError::ConcurrentDeployment {
                state: self.state(),
                holder,
            })?;

        let epoch = {
            let mut snap = self.inner.snapshot.write();
            if snap.state.is_busy() {
                return Err(PipelineError::ConcurrentDeployment {
                    state: snap.state,
                    holder: None,
                });
            }
            self.inner.log.clear();
            let last_up = snap.record.last_up;
            snap.state = PipelineState::Building;
            snap.record = DeploymentRecord {
                trigger: Some(trigger.clone()),
                build_type: Some(self.inner.settings.build_type.clone()),
                started_at: Some(Utc::now()),
                last_up,
                ..Default::default()
            };
            snap.epoch
        };
        info!(trigger = %trigger, project = %self.inner.settings.project, "deployment started");

        let pipeline = self.clone();
        let task = tokio::spawn(async move {
            let _token = token;
            match AssertUnwindSafe(pipeline.run(epoch)).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    let err = PipelineError::Internal("deployment task panicked".to_string());
                    pipeline.finish(
                        epoch,
                        Err(RecordedError {
                            stage: None,
                            message: err.to_string(),
                        }),
                    );
                    Err(err)
                }
            }
        });

        Ok(DeploymentHandle { task })
    }

    /// Start a run for a push to the tracked branch; ignore any other ref.
    pub fn handle_push(&self, event: &PushEvent) -> WebhookOutcome {
        let tracked = &self.inner.settings.branch;
        if event.git_ref() != tracked.as_str() {
            info!(git_ref = event.git_ref(), tracked = %tracked, "ignoring push to untracked ref");
            return WebhookOutcome::Ignored {
                reason: format!("{} is not the tracked branch {}", event.git_ref(), tracked),
            };
        }

        match self.trigger(Trigger::Push(event.clone())) {
            Ok(handle) => WebhookOutcome::Started(handle),
            Err(e) => {
                info!(error = %e, "push not deployed");
                WebhookOutcome::Busy {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run(&self, epoch: u64) -> RunResult {
        let sink: Arc<dyn LogSink> = self.inner.log.clone();
        let built = match self
            .inner
            .builder
            .build(&self.inner.settings.build_type, sink)
            .await
        {
            Ok(built) => built,
            Err(e) => return self.fail(epoch, e).await,
        };

        if !self.transition(epoch, PipelineState::Deploying) {
            drop(built);
            return self.supersede().await;
        }

        match built.start().await {
            Ok(running) => {
                let names = running.iter().map(|c| c.name.clone()).collect();
                if !self.finish(epoch, Ok(names)) {
                    return self.supersede().await;
                }
                Ok(running)
            }
            Err(e) => self.fail(epoch, e).await,
        }
    }

    async fn fail(&self, epoch: u64, error: BuildError) -> RunResult {
        let recorded = RecordedError {
            stage: error.stage(),
            message: error.to_string(),
        };
        if !self.finish(epoch, Err(recorded)) {
            return self.supersede().await;
        }
        Err(error.into())
    }

    /// A reset overtook this run: drop the result and take down whatever it started.
    async fn supersede(&self) -> RunResult {
        info!(project = %self.inner.settings.project, "run superseded by reset");
        let report = self.inner.stopper.stop_all().await;
        for failure in &report.failures {
            warn!(container = %failure.container, error = %failure.error, "superseded run left a container");
        }
        Err(PipelineError::Superseded)
    }

    fn transition(&self, epoch: u64, state: PipelineState) -> bool {
        let mut snap = self.inner.snapshot.write();
        if snap.epoch != epoch {
            return false;
        }
        snap.state = state;
        info!(state = %state, "pipeline transition");
        true
    }

    /// Record the end of the run, unless a reset has happened since it began.
    fn finish(&self, epoch: u64, outcome: Result<Vec<String>, RecordedError>) -> bool {
        let mut snap = self.inner.snapshot.write();
        if snap.epoch != epoch {
            return false;
        }
        let now = Utc::now();
        snap.record.finished_at = Some(now);
        match outcome {
            Ok(containers) => {
                snap.state = PipelineState::Up;
                snap.record.last_up = Some(now);
                snap.record.error = None;
                snap.record.containers = containers;
                info!(containers = ?snap.record.containers, "deployment up");
            }
            Err(error) => {
                snap.state = PipelineState::Failed;
                snap.record.containers.clear();
                warn!(stage = ?error.stage, error = %error.message, "deployment failed");
                snap.record.error = Some(error);
            }
        }
        true
    }

    /// Stop the project's containers without resetting anything else.
    pub async fn down(&self) -> Result<StopReport, PipelineError> {
        let _token = self
            .inner
            .guard
            .try_acquire(GuardInfo::new("down"))
            .map_err(|holder| PipelineError::ConcurrentDeployment {
                state: self.state(),
                holder,
            })?;

        let epoch = {
            let snap = self.inner.snapshot.read();
            if snap.state.is_busy() {
                return Err(PipelineError::ConcurrentDeployment {
                    state: snap.state,
                    holder: None,
                });
            }
            snap.epoch
        };

        let report = self.inner.stopper.stop_project().await?;
        if report.stopped.is_empty() {
            return Err(PipelineError::NotFound(format!(
                "no containers found for project {}",
                self.inner.settings.project
            )));
        }

        let mut snap = self.inner.snapshot.write();
        if snap.epoch == epoch {
            snap.state = PipelineState::Idle;
            snap.record.containers.clear();
        }
        info!(stopped = ?report.stopped, "project down");
        Ok(report)
    }

    /// Stop everything the project owns and forget the last run.
    ///
    /// Works from any state. A run in flight loses its containers first, then
    /// the reset waits for it to wind down before clearing state. Stop and
    /// cleanup failures are collected as warnings, never returned.
    pub async fn reset(&self) -> ResetReport {
        let epoch = {
            let mut snap = self.inner.snapshot.write();
            snap.epoch += 1;
            snap.state = PipelineState::Resetting;
            snap.epoch
        };
        info!(project = %self.inner.settings.project, "reset started");

        let interrupted = self.inner.stopper.stop_all().await;
        for failure in &interrupted.failures {
            debug!(container = %failure.container, error = %failure.error, "first reset pass missed a container");
        }

        let _token = self.inner.guard.acquire(GuardInfo::new("reset")).await;
        let remaining = self.inner.stopper.stop_all().await;

        let mut diagnostics = Diagnostics::default();
        for failure in &remaining.failures {
            diagnostics.warn(Warning::container_stop(&failure.container, &failure.error));
        }
        clear_directory(&self.inner.settings.project_directory, &mut diagnostics).await;
        self.inner.log.clear();

        {
            let mut snap = self.inner.snapshot.write();
            if snap.epoch == epoch {
                *snap = Snapshot {
                    epoch,
                    ..Default::default()
                };
            }
        }

        let mut stopped = interrupted.stopped;
        for name in remaining.stopped {
            if !stopped.contains(&name) {
                stopped.push(name);
            }
        }
        info!(stopped = ?stopped, "reset complete");
        ResetReport {
            stopped,
            diagnostics,
        }
    }

    pub async fn status(&self) -> StatusReport {
        let snapshot = self.snapshot();
        let log_tail = self.inner.log.tail();
        let settings = &self.inner.settings;

        let (containers, containers_error) = match self
            .inner
            .runtime
            .list_containers(&ContainerFilters::running())
            .await
        {
            Ok(list) => (
                list.iter()
                    .filter(|c| c.belongs_to(&settings.project))
                    .map(ContainerStatus::from)
                    .collect(),
                None,
            ),
            Err(e) => {
                warn!(error = %e, "could not list project containers");
                (Vec::new(), Some(e.to_string()))
            }
        };

        StatusReport {
            state: snapshot.state,
            project: settings.project.to_string(),
            build_type: settings.build_type.clone(),
            branch: settings.branch.clone(),
            record: snapshot.record,
            containers,
            containers_error,
            log_tail,
        }
    }
}

/// Remove everything inside `dir`, keeping `dir` itself.
async fn clear_directory(dir: &Path, diagnostics: &mut Diagnostics) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => {
            diagnostics.warn(Warning::workspace_cleanup(format!(
                "cannot read {}: {}",
                dir.display(),
                e
            )));
            return;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                diagnostics.warn(Warning::workspace_cleanup(format!(
                    "cannot read {}: {}",
                    dir.display(),
                    e
                )));
                break;
            }
        };
        let path = entry.path();
        let removed = match entry.file_type().await {
            Ok(kind) if kind.is_dir() => tokio::fs::remove_dir_all(&path).await,
            Ok(_) => tokio::fs::remove_file(&path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = removed {
            diagnostics.warn(Warning::workspace_cleanup(format!(
                "cannot remove {}: {}",
                path.display(),
                e
            )));
        }
    }
}
