// ABOUTME: Builder: stop the project, run a strategy's build phase, hand back a deferred start.
// ABOUTME: A failed build leaves no project containers and no half-built image behind.

use super::cleanup::discard_partial;
use super::context::BuildContext;
use super::error::{BuildError, BuildStage};
use super::stopper::ContainerStopper;
use super::strategy::{BuildStrategy, StrategyRegistry};
use crate::config::Settings;
use crate::runtime::{ContainerSummary, ImageOps, LogSink, Runtime, RuntimeInfo};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Builder<R> {
    runtime: Arc<R>,
    settings: Arc<Settings>,
    stopper: Arc<dyn ContainerStopper>,
    registry: StrategyRegistry<R>,
}

impl<R: Runtime + 'static> Builder<R> {
    pub fn new(runtime: Arc<R>, settings: Arc<Settings>, stopper: Arc<dyn ContainerStopper>) -> Self {
        Self {
            runtime,
            settings,
            stopper,
            registry: StrategyRegistry::with_defaults(),
        }
    }

    pub fn with_registry(mut self, registry: StrategyRegistry<R>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &StrategyRegistry<R> {
        &self.registry
    }

    /// Run the build phase of `build_type`, streaming tool output to `sink`.
    ///
    /// Existing project containers are stopped first. Nothing new is started;
    /// call [`BuildResult::start`] for that.
    pub async fn build(
        &self,
        build_type: &str,
        sink: Arc<dyn LogSink>,
    ) -> Result<BuildResult<R>, BuildError> {
        let strategy = self.registry.resolve(build_type)?;
        self.runtime.ping().await?;

        let ctx = BuildContext {
            runtime: self.runtime.clone(),
            settings: self.settings.clone(),
            stopper: self.stopper.clone(),
            sink,
        };

        ctx.log(&format!("==> Stopping {} containers", ctx.project()));
        let stopped = self.stopper.stop_project().await?;
        for name in &stopped.stopped {
            ctx.log(&format!("Stopped {}", name));
        }

        let artifact = strategy.artifact(&self.settings);
        let fresh_artifact = match &artifact {
            Some(image) => match self.runtime.image_exists(image).await {
                Ok(exists) => !exists,
                Err(e) => {
                    warn!(image = %image, error = %e, "could not check for existing image");
                    false
                }
            },
            None => false,
        };

        ctx.log(&format!("==> Building {} with {}", ctx.project(), strategy.name()));
        info!(project = %ctx.project(), strategy = strategy.name(), "build started");

        match strategy.build(&ctx).await {
            Ok(()) => {
                ctx.log("==> Build complete");
                Ok(BuildResult { strategy, ctx })
            }
            Err(e) => {
                ctx.log(&format!("==> {}", e));
                let partial = if fresh_artifact { artifact.as_ref() } else { None };
                discard_partial(&ctx, partial).await;
                Err(e)
            }
        }
    }
}

/// A finished build phase and the start action for it.
///
/// Consumed by [`BuildResult::start`]; dropping it starts nothing.
#[must_use = "a build is not deployed until `start` is called"]
pub struct BuildResult<R> {
    strategy: Arc<dyn BuildStrategy<R>>,
    ctx: BuildContext<R>,
}

impl<R: Runtime + 'static> BuildResult<R> {
    pub fn strategy(&self) -> &str {
        self.strategy.name()
    }

    /// Start the built project and confirm it is running.
    ///
    /// Returns the project's running containers. If the start fails, or
    /// leaves nothing running, every project container is removed.
    pub async fn start(self) -> Result<Vec<ContainerSummary>, BuildError> {
        self.ctx.log(&format!("==> Starting {}", self.ctx.project()));

        let error = match self.strategy.deploy(&self.ctx).await {
            Ok(()) => match self.ctx.running_project_containers().await {
                Ok(running) if !running.is_empty() => {
                    for c in &running {
                        self.ctx.log(&format!("Running {} ({})", c.name, c.id.short()));
                    }
                    return Ok(running);
                }
                Ok(_) => BuildError::failed(
                    BuildStage::Run,
                    "no project containers running after start",
                ),
                Err(e) => BuildError::failed(BuildStage::Run, e),
            },
            Err(e) => e,
        };

        self.ctx.log(&format!("==> {}", error));
        discard_partial(&self.ctx, None).await;
        Err(error)
    }
}
