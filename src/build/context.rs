// ABOUTME: Shared inputs for a single build: runtime, settings, stopper, and log sink.
// ABOUTME: Also runs one-shot tool containers, streaming their output to the sink.

use super::error::{BuildError, BuildStage, StageExt};
use super::stopper::ContainerStopper;
use crate::config::Settings;
use crate::runtime::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerOps, ContainerSummary, LogOps,
    LogOptions, LogSink, MANAGED_LABEL, PROJECT_LABEL, Runtime,
};
use crate::types::{ContainerId, ImageRef, ProjectName};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct BuildContext<R> {
    pub runtime: Arc<R>,
    pub settings: Arc<Settings>,
    pub stopper: Arc<dyn ContainerStopper>,
    pub sink: Arc<dyn LogSink>,
}

impl<R> Clone for BuildContext<R> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            settings: self.settings.clone(),
            stopper: self.stopper.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<R: Runtime> BuildContext<R> {
    pub fn project(&self) -> &ProjectName {
        &self.settings.project
    }

    /// Labels every builder-created container carries.
    pub fn labels(&self) -> HashMap<String, String> {
        HashMap::from([
            (MANAGED_LABEL.to_string(), "true".to_string()),
            (PROJECT_LABEL.to_string(), self.project().to_string()),
        ])
    }

    /// Container config named `<project><suffix>` with the project labels.
    pub fn container(&self, suffix: &str, image: ImageRef) -> ContainerConfig {
        let mut config = ContainerConfig::new(format!("{}{}", self.project(), suffix), image);
        config.labels = self.labels();
        config
    }

    pub fn log(&self, line: &str) {
        self.sink.write_line(line);
    }

    /// Create and start `config`, follow its output, and wait for it to exit.
    ///
    /// A non-zero exit, or the container vanishing mid-run, is a failure in
    /// `stage` and the container is removed. On success the exited container
    /// is left for the caller.
    pub async fn run_to_completion(
        &self,
        config: &ContainerConfig,
        stage: BuildStage,
    ) -> Result<ContainerId, BuildError> {
        // A leftover from an interrupted run would block the name.
        self.remove_named(&config.name).await;

        let id = self.runtime.create_container(config).await.at(stage)?;
        match self.run_created(&id, config, stage).await {
            Ok(()) => Ok(id),
            Err(e) => {
                self.discard(&id).await;
                Err(e)
            }
        }
    }

    async fn run_created(
        &self,
        id: &ContainerId,
        config: &ContainerConfig,
        stage: BuildStage,
    ) -> Result<(), BuildError> {
        debug!(container = %id.short(), name = %config.name, "starting tool container");
        self.runtime.start_container(id).await.at(stage)?;

        match self.runtime.container_logs(id, &LogOptions::follow_all()).await {
            Ok(mut lines) => {
                while let Some(line) = lines.next().await {
                    match line {
                        Ok(line) => {
                            for l in line.content.lines() {
                                if !l.trim().is_empty() {
                                    self.sink.write_line(l.trim_end());
                                }
                            }
                        }
                        Err(e) => {
                            warn!(container = %id.short(), error = %e, "log stream ended early");
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!(container = %id.short(), error = %e, "could not follow logs"),
        }

        let code = self.runtime.wait_container(id).await.map_err(|e| {
            if e.is_gone() {
                BuildError::failed(stage, format!("{} was removed while running", config.name))
            } else {
                BuildError::failed(stage, e)
            }
        })?;

        if code != 0 {
            return Err(BuildError::failed(
                stage,
                format!("{} exited with status {}", config.name, code),
            ));
        }
        Ok(())
    }

    /// Force-remove a container, ignoring containers that are already gone.
    pub async fn discard(&self, id: &ContainerId) {
        if let Err(e) = self.runtime.remove_container(id, true).await
            && !e.is_gone()
        {
            warn!(container = %id.short(), error = %e, "failed to remove tool container");
        }
    }

    async fn remove_named(&self, name: &str) {
        let filters = ContainerFilters {
            name: Some(name.to_string()),
            all: true,
            ..Default::default()
        };
        if let Ok(existing) = self.runtime.list_containers(&filters).await {
            for c in existing.iter().filter(|c| c.name == name) {
                self.discard(&c.id).await;
            }
        }
    }

    /// Running containers that belong to the project.
    pub async fn running_project_containers(
        &self,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let project = self.project();
        Ok(self
            .runtime
            .list_containers(&ContainerFilters::running())
            .await?
            .into_iter()
            .filter(|c| c.belongs_to(project))
            .collect())
    }
}
