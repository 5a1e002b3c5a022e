// ABOUTME: Provider-agnostic webhook event model.
// ABOUTME: Detects the provider from headers and normalises its push payload into a PushEvent.

mod error;
pub mod github;
pub mod gitlab;

pub use error::{WebhookError, WebhookErrorKind};

use serde::Serialize;
use std::fmt;

/// Webhook sources dockhand understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    GitLab,
}

impl Provider {
    /// Find the provider's event header and return it with the event name.
    ///
    /// Header names are matched case-insensitively.
    pub fn detect<'a, I>(headers: I) -> Result<(Provider, &'a str), WebhookError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in headers {
            if name.eq_ignore_ascii_case(github::EVENT_HEADER) {
                return Ok((Provider::GitHub, value));
            }
            if name.eq_ignore_ascii_case(gitlab::EVENT_HEADER) {
                return Ok((Provider::GitLab, value));
            }
        }
        Err(WebhookError::UnsupportedEvent(
            "no recognised event header".to_string(),
        ))
    }

    /// Parse `payload` as this provider's `event`.
    pub fn parse(self, event: &str, payload: &[u8]) -> Result<PushEvent, WebhookError> {
        match self {
            Provider::GitHub => github::parse(event, payload),
            Provider::GitLab => gitlab::parse(event, payload),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::GitHub => "github",
            Provider::GitLab => "gitlab",
        })
    }
}

/// What a provider's push payload must expose.
pub trait PushPayload {
    fn git_ref(&self) -> &str;
    fn repository_name(&self) -> &str;
    fn clone_url(&self) -> &str;
    fn ssh_url(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Push,
}

/// A push, independent of which provider reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushEvent {
    provider: Provider,
    kind: EventKind,
    #[serde(rename = "ref")]
    git_ref: String,
    repository: String,
    clone_url: String,
    ssh_url: String,
}

impl PushEvent {
    pub fn from_payload(
        provider: Provider,
        payload: &impl PushPayload,
    ) -> Result<Self, WebhookError> {
        if payload.git_ref().trim().is_empty() {
            return Err(WebhookError::MalformedPayload("empty ref".to_string()));
        }
        if payload.repository_name().trim().is_empty() {
            return Err(WebhookError::MalformedPayload(
                "empty repository name".to_string(),
            ));
        }
        Ok(Self {
            provider,
            kind: EventKind::Push,
            git_ref: payload.git_ref().to_string(),
            repository: payload.repository_name().to_string(),
            clone_url: payload.clone_url().to_string(),
            ssh_url: payload.ssh_url().to_string(),
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }

    pub fn repository_name(&self) -> &str {
        &self.repository
    }

    pub fn clone_url(&self) -> &str {
        &self.clone_url
    }

    pub fn ssh_url(&self) -> &str {
        &self.ssh_url
    }

    /// Branch name when the ref is a branch, e.g. `main` for `refs/heads/main`.
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix("refs/heads/")
    }
}

/// Parse a webhook delivery from its headers and raw body.
pub fn parse<'a, I>(headers: I, payload: &[u8]) -> Result<PushEvent, WebhookError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let (provider, event) = Provider::detect(headers)?;
    provider.parse(event, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, &'static str);

    impl PushPayload for Fixed {
        fn git_ref(&self) -> &str {
            self.0
        }
        fn repository_name(&self) -> &str {
            self.1
        }
        fn clone_url(&self) -> &str {
            ""
        }
        fn ssh_url(&self) -> &str {
            ""
        }
    }

    #[test]
    fn detects_provider_case_insensitively() {
        let headers = [("content-type", "application/json"), ("x-github-event", "push")];
        assert_eq!(
            Provider::detect(headers).unwrap(),
            (Provider::GitHub, "push")
        );

        let headers = [("X-GITLAB-EVENT", "Push Hook")];
        assert_eq!(
            Provider::detect(headers).unwrap(),
            (Provider::GitLab, "Push Hook")
        );
    }

    #[test]
    fn no_event_header_is_unsupported() {
        let err = Provider::detect([("X-Gitea-Event", "push")]).unwrap_err();
        assert_eq!(err.kind(), WebhookErrorKind::UnsupportedEvent);
    }

    #[test]
    fn empty_ref_or_name_is_malformed() {
        for payload in [Fixed("", "shop"), Fixed("refs/heads/main", " ")] {
            let err = PushEvent::from_payload(Provider::GitHub, &payload).unwrap_err();
            assert_eq!(err.kind(), WebhookErrorKind::MalformedPayload);
        }
    }

    #[test]
    fn branch_only_for_head_refs() {
        let event = PushEvent::from_payload(Provider::GitHub, &Fixed("refs/heads/dev", "shop"))
            .unwrap();
        assert_eq!(event.branch(), Some("dev"));

        let tag = PushEvent::from_payload(Provider::GitHub, &Fixed("refs/tags/v1", "shop"))
            .unwrap();
        assert_eq!(tag.branch(), None);
    }
}
