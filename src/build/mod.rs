// ABOUTME: Builder and build strategies: docker-compose, dockerfile, and herokuish.
// ABOUTME: Exports the registry, the Container Stopper, and the two-phase BuildResult.

mod archive;
mod builder;
mod cleanup;
mod compose;
mod context;
mod dockerfile;
mod error;
mod herokuish;
mod stopper;
mod strategy;
#[cfg(test)]
pub(crate) mod testing;

pub use builder::{BuildResult, Builder};
pub use compose::ComposeStrategy;
pub use context::BuildContext;
pub use dockerfile::DockerfileStrategy;
pub use error::{BuildError, BuildErrorKind, BuildStage};
pub use herokuish::HerokuishStrategy;
pub use stopper::{ContainerStopper, ProjectContainerStopper, StopFailure, StopReport};
pub use strategy::{BuildStrategy, BuildType, StrategyRegistry};
