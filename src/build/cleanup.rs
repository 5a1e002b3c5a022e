// ABOUTME: Cleanup after a failed build or start.
// ABOUTME: Force-removes the project's containers and any image the failed attempt created.

use super::context::BuildContext;
use crate::runtime::{ImageOps, Runtime};
use crate::types::ImageRef;
use tracing::{info, warn};

/// Remove what a failed attempt left behind.
///
/// Every container belonging to the project is taken down. `new_image` is
/// removed only when it did not exist before the attempt started.
pub async fn discard_partial<R: Runtime>(ctx: &BuildContext<R>, new_image: Option<&ImageRef>) {
    match ctx.stopper.stop_project().await {
        Ok(report) if !report.stopped.is_empty() => {
            info!(project = %ctx.project(), containers = ?report.stopped, "removed partial containers");
        }
        Ok(_) => {}
        Err(e) => warn!(project = %ctx.project(), error = %e, "cleanup could not stop every container"),
    }

    if let Some(image) = new_image {
        match ctx.runtime.image_exists(image).await {
            Ok(true) => {
                if let Err(e) = ctx.runtime.remove_image(image, true).await {
                    warn!(image = %image, error = %e, "failed to remove partial image");
                }
            }
            Ok(false) => {}
            Err(e) => warn!(image = %image, error = %e, "failed to inspect partial image"),
        }
    }
}
