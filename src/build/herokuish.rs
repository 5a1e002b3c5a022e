// ABOUTME: Herokuish build strategy: buildpack detection inside the pinned herokuish image.
// ABOUTME: The builder container is committed to dockhand/<project>-herokuish:latest.

use super::context::BuildContext;
use super::error::{BuildError, BuildStage, StageExt};
use super::strategy::BuildStrategy;
use crate::config::Settings;
use crate::runtime::{ContainerOps, ImageOps, Runtime, VolumeMount};
use crate::types::ImageRef;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

const APP_DIR: &str = "/tmp/app";
const WEB_PORT: u16 = 5000;
const IMAGE_SUFFIX: &str = "-herokuish";

pub struct HerokuishStrategy;

#[async_trait]
impl<R: Runtime> BuildStrategy<R> for HerokuishStrategy {
    fn name(&self) -> &str {
        "herokuish"
    }

    fn artifact(&self, settings: &Settings) -> Option<ImageRef> {
        Some(ImageRef::for_project(&settings.project, IMAGE_SUFFIX))
    }

    async fn build(&self, ctx: &BuildContext<R>) -> Result<(), BuildError> {
        let image = &ctx.settings.herokuish_image;
        ctx.log(&format!("Pulling {}", image));
        ctx.runtime
            .pull_image(image, ctx.sink.as_ref())
            .await
            .at(BuildStage::Pull)?;

        let mut config = ctx.container("-herokuish-build", image.clone());
        config.volumes = vec![VolumeMount::bind(
            ctx.settings.project_directory.to_string_lossy(),
            APP_DIR,
        )];
        config.command = Some(vec!["/build".to_string()]);

        info!(project = %ctx.project(), "running herokuish build");
        let builder = ctx.run_to_completion(&config, BuildStage::Build).await?;

        let tag = ImageRef::for_project(ctx.project(), IMAGE_SUFFIX);
        let committed = ctx.runtime.commit_container(&builder, &tag).await;
        ctx.discard(&builder).await;
        committed.at(BuildStage::Build)?;
        ctx.log(&format!("Committed {}", tag));
        Ok(())
    }

    async fn deploy(&self, ctx: &BuildContext<R>) -> Result<(), BuildError> {
        let mut config = ctx.container("", ImageRef::for_project(ctx.project(), IMAGE_SUFFIX));
        config.command = Some(vec!["/start".to_string(), "web".to_string()]);
        config.env = HashMap::from([("PORT".to_string(), WEB_PORT.to_string())]);
        config.exposed_ports = vec![WEB_PORT];
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
