// ABOUTME: Error types for webhook payload parsing.
// ABOUTME: Parse errors never reach the pipeline; they are reported to the caller only.

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("unsupported event: {0}")]
    UnsupportedEvent(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Error kind for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookErrorKind {
    UnsupportedEvent,
    MalformedPayload,
}

impl WebhookError {
    pub fn kind(&self) -> WebhookErrorKind {
        match self {
            WebhookError::UnsupportedEvent(_) => WebhookErrorKind::UnsupportedEvent,
            WebhookError::MalformedPayload(_) => WebhookErrorKind::MalformedPayload,
        }
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::MalformedPayload(err.to_string())
    }
}
