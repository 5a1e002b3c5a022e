// ABOUTME: Composable capability traits for the local container runtime.
// ABOUTME: Defines ContainerOps, ImageOps, LogOps, RuntimeInfo, and the LogSink seam.

mod container;
mod image;
mod logs;
mod runtime_info;
pub(crate) mod sealed;
mod shared_types;

pub use container::{
    COMPOSE_PROJECT_LABEL, ContainerError, ContainerFilters, ContainerOps, ContainerSummary,
    MANAGED_LABEL, PROJECT_LABEL,
};
pub use image::{ImageError, ImageOps};
pub use logs::{LogError, LogLine, LogOps, LogOptions, LogSink, LogStream};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError, RuntimeMetadata};
pub use shared_types::*;

/// Everything the builder and pipeline need from a runtime.
pub trait Runtime: ContainerOps + ImageOps + LogOps + RuntimeInfo {}

impl<T> Runtime for T where T: ContainerOps + ImageOps + LogOps + RuntimeInfo {}
