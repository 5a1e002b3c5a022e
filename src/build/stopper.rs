// ABOUTME: Container Stopper: force-stops and removes a project's containers.
// ABOUTME: Spares infrastructure containers and the daemon's own container.

use super::error::BuildError;
use crate::config::Settings;
use crate::runtime::{
    COMPOSE_PROJECT_LABEL, ContainerFilters, ContainerOps, ContainerSummary, PROJECT_LABEL,
};
use crate::types::ProjectName;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Containers a stop pass took down, and the ones it could not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StopReport {
    pub stopped: Vec<String>,
    pub failures: Vec<StopFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopFailure {
    pub container: String,
    pub error: String,
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[async_trait]
pub trait ContainerStopper: Send + Sync {
    /// Clear the way for a build. Any container that cannot be stopped fails
    /// the whole call.
    async fn stop_project(&self) -> Result<StopReport, BuildError>;

    /// Best-effort stop of everything the project owns. Failures are reported,
    /// never returned as an error.
    async fn stop_all(&self) -> StopReport;
}

/// Stops containers through the runtime with `SIGKILL`, then removes them.
pub struct ProjectContainerStopper<R> {
    runtime: Arc<R>,
    project: ProjectName,
    infrastructure: Vec<String>,
    own_id: Option<String>,
}

impl<R: ContainerOps> ProjectContainerStopper<R> {
    pub fn new(runtime: Arc<R>, settings: &Settings) -> Self {
        Self {
            runtime,
            project: settings.project.clone(),
            infrastructure: settings.infrastructure_containers.clone(),
            own_id: own_container_id(),
        }
    }

    /// Override the detected id of the container the daemon runs in.
    pub fn with_own_id(mut self, id: Option<String>) -> Self {
        self.own_id = id;
        self
    }

    fn is_own(&self, c: &ContainerSummary) -> bool {
        self.own_id
            .as_deref()
            .is_some_and(|own| c.id.starts_with(own))
    }

    fn is_infrastructure(&self, c: &ContainerSummary) -> bool {
        self.infrastructure.iter().any(|name| name == &c.name)
    }

    fn is_labelled(&self, c: &ContainerSummary) -> bool {
        let name = self.project.as_str();
        c.labels.get(PROJECT_LABEL).map(String::as_str) == Some(name)
            || c.labels.get(COMPOSE_PROJECT_LABEL).map(String::as_str) == Some(name)
    }

    async fn candidates(&self) -> Result<Vec<ContainerSummary>, BuildError> {
        let filters = ContainerFilters {
            all: true,
            ..Default::default()
        };
        let containers = self
            .runtime
            .list_containers(&filters)
            .await
            .map_err(|e| BuildError::ContainerStopFailed(e.to_string()))?;

        Ok(containers
            .into_iter()
            .filter(|c| c.belongs_to(&self.project) && !self.is_own(c))
            .collect())
    }

    async fn take_down(&self, c: &ContainerSummary) -> Result<(), String> {
        if c.is_running() {
            match self.runtime.kill_container(&c.id, "SIGKILL").await {
                Ok(()) => {}
                Err(e) if e.is_gone() => {}
                Err(e) => return Err(e.to_string()),
            }
        }
        match self.runtime.remove_container(&c.id, true).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_gone() => Ok(()),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn take_down_all(&self, targets: Vec<ContainerSummary>) -> StopReport {
        let mut report = StopReport::default();
        for c in targets {
            match self.take_down(&c).await {
                Ok(()) => {
                    debug!(container = %c.name, "stopped");
                    report.stopped.push(c.name);
                }
                Err(error) => {
                    warn!(container = %c.name, error = %error, "failed to stop container");
                    report.failures.push(StopFailure {
                        container: c.name,
                        error,
                    });
                }
            }
        }
        report
    }
}

#[async_trait]
impl<R: ContainerOps + 'static> ContainerStopper for ProjectContainerStopper<R> {
    async fn stop_project(&self) -> Result<StopReport, BuildError> {
        let targets: Vec<_> = self
            .candidates()
            .await?
            .into_iter()
            .filter(|c| !self.is_infrastructure(c))
            .collect();

        let report = self.take_down_all(targets).await;
        if let Some(first) = report.failures.first() {
            return Err(BuildError::ContainerStopFailed(format!(
                "{}: {}",
                first.container, first.error
            )));
        }
        if !report.stopped.is_empty() {
            info!(project = %self.project, count = report.stopped.len(), "stopped project containers");
        }
        Ok(report)
    }

    async fn stop_all(&self) -> StopReport {
        let targets = match self.candidates().await {
            Ok(all) => all
                .into_iter()
                .filter(|c| !self.is_infrastructure(c) || self.is_labelled(c))
                .collect(),
            Err(e) => {
                return StopReport {
                    stopped: Vec::new(),
                    failures: vec![StopFailure {
                        container: "*".to_string(),
                        error: e.to_string(),
                    }],
                };
            }
        };
        self.take_down_all(targets).await
    }
}

/// Short container id of the daemon when it runs inside a container.
///
/// Docker sets the hostname to the first 12 hex digits of the id.
fn own_container_id() -> Option<String> {
    let hostname = gethostname::gethostname().to_string_lossy().into_owned();
    looks_like_container_id(&hostname).then_some(hostname)
}

fn looks_like_container_id(s: &str) -> bool {
    s.len() == 12 && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::{FailPoint, FakeRuntime};

    fn stopper(runtime: &Arc<FakeRuntime>) -> ProjectContainerStopper<FakeRuntime> {
        let settings = Settings::for_directory(
            std::path::Path::new("/srv"),
            ProjectName::new("shop").unwrap(),
        );
        ProjectContainerStopper::new(runtime.clone(), &settings).with_own_id(None)
    }

    #[tokio::test]
    async fn stops_only_project_containers() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_running("shop_web_1", &[]);
        runtime.add_running("db", &[(COMPOSE_PROJECT_LABEL, "shop")]);
        runtime.add_running("blog_web_1", &[]);

        let report = stopper(&runtime).stop_project().await.unwrap();

        assert_eq!(report.stopped.len(), 2);
        assert_eq!(runtime.running_names(), vec!["blog_web_1"]);
        assert_eq!(runtime.count_calls("kill"), 2);
    }

    #[tokio::test]
    async fn spares_containers_that_only_contain_the_project_name() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_running("shop", &[]);
        runtime.add_running("workshop-db", &[]);
        runtime.add_running("shopfront", &[]);

        let report = stopper(&runtime).stop_project().await.unwrap();

        assert_eq!(report.stopped, vec!["shop"]);
        assert_eq!(runtime.running_names(), vec!["shopfront", "workshop-db"]);
    }

    #[tokio::test]
    async fn spares_infrastructure_and_own_container() {
        let runtime = Arc::new(FakeRuntime::new());
        let own = runtime.add_running("shop-daemon-sidecar", &[]);
        let settings = Settings {
            infrastructure_containers: vec!["shop-proxy".to_string()],
            ..Settings::for_directory(
                std::path::Path::new("/srv"),
                ProjectName::new("shop").unwrap(),
            )
        };
        runtime.add_running("shop-proxy", &[]);
        runtime.add_running("shop_web_1", &[]);

        let stopper = ProjectContainerStopper::new(runtime.clone(), &settings)
            .with_own_id(Some(own.short().to_string()));
        stopper.stop_project().await.unwrap();

        assert_eq!(
            runtime.running_names(),
            vec!["shop-daemon-sidecar", "shop-proxy"]
        );
    }

    #[tokio::test]
    async fn stop_all_takes_labelled_infrastructure_too() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_running("dockhand-daemon", &[]);
        runtime.add_running("shop-cache", &[(PROJECT_LABEL, "shop")]);
        let settings = Settings {
            infrastructure_containers: vec!["shop-cache".to_string()],
            ..Settings::for_directory(
                std::path::Path::new("/srv"),
                ProjectName::new("shop").unwrap(),
            )
        };

        let report = ProjectContainerStopper::new(runtime.clone(), &settings)
            .with_own_id(None)
            .stop_all()
            .await;

        assert!(report.is_clean());
        assert_eq!(runtime.running_names(), vec!["dockhand-daemon"]);
    }

    #[tokio::test]
    async fn kill_failure_fails_stop_project_but_not_stop_all() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.add_running("shop_web_1", &[]);
        runtime.fail(FailPoint::Kill, "permission denied");

        let err = stopper(&runtime).stop_project().await.unwrap_err();
        assert!(matches!(err, BuildError::ContainerStopFailed(ref m) if m.contains("permission denied")));

        let report = stopper(&runtime).stop_all().await;
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].container, "shop_web_1");
    }

    #[tokio::test]
    async fn removes_exited_project_containers() {
        let runtime = Arc::new(FakeRuntime::new());
        let id = runtime.add_running("shop", &[]);
        runtime.kill_container(&id, "SIGKILL").await.unwrap();

        stopper(&runtime).stop_project().await.unwrap();
        assert!(runtime.containers().is_empty());
    }

    #[test]
    fn container_hostnames_are_twelve_hex_digits() {
        assert!(looks_like_container_id("3f4e1a2b9c0d"));
        assert!(!looks_like_container_id("build-host"));
        assert!(!looks_like_container_id("3f4e1a2b9c0"));
    }
}
