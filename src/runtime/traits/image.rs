// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Pull, build from a tar context, commit, check existence, and remove images.

use super::logs::LogSink;
use super::sealed::Sealed;
use crate::types::{ContainerId, ImageId, ImageRef};
use async_trait::async_trait;

/// Image operations.
#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Pull an image, reporting progress lines to `sink`.
    async fn pull_image(&self, reference: &ImageRef, sink: &dyn LogSink)
    -> Result<(), ImageError>;

    /// Build `tag` from a tarred build context, streaming build output to `sink`.
    async fn build_image(
        &self,
        tag: &ImageRef,
        context: Vec<u8>,
        sink: &dyn LogSink,
    ) -> Result<ImageId, ImageError>;

    /// Snapshot a container's filesystem as `tag`.
    async fn commit_container(
        &self,
        container: &ContainerId,
        tag: &ImageRef,
    ) -> Result<ImageId, ImageError>;

    /// Check if an image exists locally.
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError>;

    /// Remove an image.
    async fn remove_image(&self, reference: &ImageRef, force: bool) -> Result<(), ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("commit failed: {0}")]
    CommitFailed(String),

    #[error("image in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
