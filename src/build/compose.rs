// ABOUTME: docker-compose build strategy using the pinned compose tool image.
// ABOUTME: Builds with `build --pull`, deploys with `up -d`, both as one-shot containers.

use super::context::BuildContext;
use super::error::{BuildError, BuildStage, StageExt};
use super::strategy::BuildStrategy;
use crate::config::Settings;
use crate::runtime::{ContainerConfig, ENGINE_SOCKET, ImageOps, Runtime, VolumeMount};
use crate::types::ImageRef;
use async_trait::async_trait;
use tracing::info;

/// Where the project directory is mounted inside the compose container.
const WORKDIR: &str = "/build/project";

pub struct ComposeStrategy;

impl ComposeStrategy {
    fn tool<R: Runtime>(ctx: &BuildContext<R>, suffix: &str, args: &[&str]) -> ContainerConfig {
        let mut config = ctx.container(suffix, ctx.settings.compose_image.clone());
        config.volumes = vec![
            VolumeMount::bind(ENGINE_SOCKET, ENGINE_SOCKET),
            VolumeMount::bind(ctx.settings.project_directory.to_string_lossy(), WORKDIR),
        ];
        config.working_dir = Some(WORKDIR.to_string());
        config.entrypoint = Some(vec!["docker-compose".to_string()]);

        let mut command = vec!["-p".to_string(), ctx.project().to_string()];
        command.extend(args.iter().map(|a| a.to_string()));
        config.command = Some(command);
        config
    }
}

#[async_trait]
impl<R: Runtime> BuildStrategy<R> for ComposeStrategy {
    fn name(&self) -> &str {
        "docker-compose"
    }

    fn artifact(&self, _settings: &Settings) -> Option<ImageRef> {
        // Service images are named by compose itself.
        None
    }

    async fn build(&self, ctx: &BuildContext<R>) -> Result<(), BuildError> {
        let image = &ctx.settings.compose_image;
        ctx.log(&format!("Pulling {}", image));
        ctx.runtime
            .pull_image(image, ctx.sink.as_ref())
            .await
            .at(BuildStage::Pull)?;

        info!(project = %ctx.project(), "running docker-compose build");
        let config = Self::tool(ctx, "-compose-build", &["build", "--pull"]);
        let id = ctx.run_to_completion(&config, BuildStage::Build).await?;
        ctx.discard(&id).await;
        Ok(())
    }

    async fn deploy(&self, ctx: &BuildContext<R>) -> Result<(), BuildError> {
        info!(project = %ctx.project(), "running docker-compose up");
        let config = Self::tool(ctx, "-compose-up", &["up", "-d"]);
        let id = ctx.run_to_completion(&config, BuildStage::Run).await?;
        ctx.discard(&id).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::testing::Harness;
    use crate::runtime::fake::FailPoint;

    #[tokio::test]
    async fn build_pulls_tool_and_runs_build_with_pull() {
        let h = Harness::new("docker-compose");

        ComposeStrategy.build(&h.ctx).await.unwrap();

        assert!(h.runtime.has_image("docker/compose:1.22.0"));
        assert_eq!(h.runtime.calls()[0], "pull docker/compose:1.22.0");
        assert_eq!(h.runtime.count_calls("create shop-compose-build"), 1);
        // Nothing is started by the build phase, and the tool container is gone.
        assert!(h.runtime.containers().is_empty());
        assert!(h.log.contains("-p shop build --pull"));
    }

    #[tokio::test]
    async fn build_failure_is_tagged_with_stage() {
        let h = Harness::new("docker-compose");
        h.runtime.fail(FailPoint::Pull, "manifest unknown");
        let err = ComposeStrategy.build(&h.ctx).await.unwrap_err();
        assert_eq!(err.stage(), Some(BuildStage::Pull));

        h.runtime.clear_failure(FailPoint::Pull);
        h.runtime.fail(FailPoint::Wait, "service web failed to build");
        let err = ComposeStrategy.build(&h.ctx).await.unwrap_err();
        assert_eq!(err.stage(), Some(BuildStage::Build));
        assert!(h.log.contains("service web failed to build"));
    }

    #[tokio::test]
    async fn deploy_brings_up_the_compose_project() {
        let h = Harness::new("docker-compose");
        ComposeStrategy.build(&h.ctx).await.unwrap();

        ComposeStrategy.deploy(&h.ctx).await.unwrap();

        assert_eq!(h.runtime.running_names(), vec!["shop_web_1"]);
        assert_eq!(h.runtime.count_calls("create shop-compose-up"), 1);
    }
}
