// ABOUTME: GitLab push webhook payloads.
// ABOUTME: Recognises the `Push Hook` event and reads repository details from `project`.

use super::error::WebhookError;
use super::{PushEvent, PushPayload};
use serde::Deserialize;

pub const EVENT_HEADER: &str = "X-Gitlab-Event";
pub const PUSH_EVENT: &str = "Push Hook";

#[derive(Debug, Deserialize)]
struct GitLabPush {
    #[serde(rename = "ref")]
    reference: String,
    project: GitLabProject,
}

#[derive(Debug, Deserialize)]
struct GitLabProject {
    name: String,
    #[serde(default)]
    git_http_url: String,
    #[serde(default)]
    git_ssh_url: String,
}

impl PushPayload for GitLabPush {
    fn git_ref(&self) -> &str {
        &self.reference
    }

    fn repository_name(&self) -> &str {
        &self.project.name
    }

    fn clone_url(&self) -> &str {
        &self.project.git_http_url
    }

    fn ssh_url(&self) -> &str {
        &self.project.git_ssh_url
    }
}

pub(super) fn parse(event: &str, payload: &[u8]) -> Result<PushEvent, WebhookError> {
    if !event.trim().eq_ignore_ascii_case(PUSH_EVENT) {
        return Err(WebhookError::UnsupportedEvent(format!("gitlab {}", event)));
    }
    let push: GitLabPush = serde_json::from_slice(payload)?;
    PushEvent::from_payload(super::Provider::GitLab, &push)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::error::WebhookErrorKind;

    #[test]
    fn parses_push_hook() {
        let body = br#"{
            "object_kind": "push",
            "ref": "refs/heads/main",
            "project": {
                "name": "shop",
                "git_http_url": "https://gitlab.com/acme/shop.git",
                "git_ssh_url": "git@gitlab.com:acme/shop.git"
            }
        }"#;
        let event = parse("Push Hook", body).unwrap();
        assert_eq!(event.repository_name(), "shop");
        assert_eq!(event.clone_url(), "https://gitlab.com/acme/shop.git");
        assert_eq!(event.ssh_url(), "git@gitlab.com:acme/shop.git");
    }

    #[test]
    fn tag_push_hook_is_unsupported() {
        let err = parse("Tag Push Hook", b"{}").unwrap_err();
        assert_eq!(err.kind(), WebhookErrorKind::UnsupportedEvent);
    }
}
