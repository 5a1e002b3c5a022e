// ABOUTME: GitHub push webhook payloads.
// ABOUTME: Only the `push` event is recognised; see the GitHub PushEvent docs for the shape.

use super::error::WebhookError;
use super::{PushEvent, PushPayload};
use serde::Deserialize;

pub const EVENT_HEADER: &str = "X-GitHub-Event";
pub const PUSH_EVENT: &str = "push";

#[derive(Debug, Deserialize)]
struct GitHubPush {
    #[serde(rename = "ref")]
    reference: String,
    repository: GitHubRepository,
}

#[derive(Debug, Deserialize)]
struct GitHubRepository {
    name: String,
    #[serde(default)]
    clone_url: String,
    #[serde(default)]
    ssh_url: String,
}

impl PushPayload for GitHubPush {
    fn git_ref(&self) -> &str {
        &self.reference
    }

    fn repository_name(&self) -> &str {
        &self.repository.name
    }

    fn clone_url(&self) -> &str {
        &self.repository.clone_url
    }

    fn ssh_url(&self) -> &str {
        &self.repository.ssh_url
    }
}

pub(super) fn parse(event: &str, payload: &[u8]) -> Result<PushEvent, WebhookError> {
    if !event.trim().eq_ignore_ascii_case(PUSH_EVENT) {
        return Err(WebhookError::UnsupportedEvent(format!("github {}", event)));
    }
    let push: GitHubPush = serde_json::from_slice(payload)?;
    PushEvent::from_payload(super::Provider::GitHub, &push)
}
