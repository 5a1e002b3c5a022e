// ABOUTME: Dockerfile build strategy: one image built from the project directory.
// ABOUTME: The image is tagged dockhand/<project>:latest and run as a container named <project>.

use super::archive::tar_directory;
use super::context::BuildContext;
use super::error::{BuildError, BuildStage, StageExt};
use super::strategy::BuildStrategy;
use crate::config::Settings;
use crate::runtime::{ContainerOps, ImageOps, Runtime};
use crate::types::ImageRef;
use async_trait::async_trait;
use tracing::info;

pub struct DockerfileStrategy;

#[async_trait]
impl<R: Runtime> BuildStrategy<R> for DockerfileStrategy {
    fn name(&self) -> &str {
        "dockerfile"
    }

    fn artifact(&self, settings: &Settings) -> Option<ImageRef> {
        Some(ImageRef::for_project(&settings.project, ""))
    }

    async fn build(&self, ctx: &BuildContext<R>) -> Result<(), BuildError> {
        let dir = &ctx.settings.project_directory;
        if !dir.join("Dockerfile").is_file() {
            return Err(BuildError::failed(
                BuildStage::Build,
                format!("no Dockerfile in {}", dir.display()),
            ));
        }

        let context = tar_directory(dir)
            .await
            .map_err(|e| BuildError::failed(BuildStage::Build, format!("build context: {}", e)))?;

        let tag = ImageRef::for_project(ctx.project(), "");
        info!(project = %ctx.project(), image = %tag, "building image");
        ctx.log(&format!("Building {}", tag));
        ctx.runtime
            .build_image(&tag, context, ctx.sink.as_ref())
            .await
            .at(BuildStage::Build)?;
        Ok(())
    }

    async fn deploy(&self, ctx: &BuildContext<R>) -> Result<(), BuildError> {
        let mut config = ctx.container("", ImageRef::for_project(ctx.project(), ""));
        config.publish_all_ports = true;

        let id = ctx
            .runtime
            .create_container(&config)
            .await
            .at(BuildStage::Run)?;
        ctx.runtime.start_container(&id).await.at(BuildStage::Run)?;
        info!(project = %ctx.project(), container = %id.short(), "started container");
        Ok(())
    }
}
