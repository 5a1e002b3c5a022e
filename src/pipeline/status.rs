// ABOUTME: Status reporter: a read-only projection of pipeline state, record, and log tail.
// ABOUTME: Built from a copied snapshot plus a live container list taken outside every lock.

use super::state::{DeploymentRecord, PipelineState};
use crate::runtime::ContainerSummary;
use serde::Serialize;

/// What `status` shows.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: PipelineState,
    pub project: String,
    pub build_type: String,
    pub branch: String,
    pub record: DeploymentRecord,
    /// Running project containers, as listed when the report was taken.
    pub containers: Vec<ContainerStatus>,
    /// Set when the container list could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containers_error: Option<String>,
    pub log_tail: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerStatus {
    pub name: String,
    pub id: String,
    pub image: String,
}

impl StatusReport {
    pub fn container_names(&self) -> Vec<&str> {
        self.containers.iter().map(|c| c.name.as_str()).collect()
    }
}

impl From<&ContainerSummary> for ContainerStatus {
    fn from(c: &ContainerSummary) -> Self {
        Self {
            name: c.name.clone(),
            id: c.id.short().to_string(),
            image: c.image.clone(),
        }
    }
}
