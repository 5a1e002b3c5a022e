// ABOUTME: Log streaming trait for container runtimes, plus the sink build output is written to.
// ABOUTME: Build tools run as containers, so following their logs is how output reaches callers.

use super::sealed::Sealed;
use crate::types::ContainerId;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Destination for build tool output, written line by line as it is produced.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn write_line(&self, line: &str) {
        self(line)
    }
}

/// Log streaming operations.
#[async_trait]
pub trait LogOps: Sealed + Send + Sync {
    /// Stream logs from a container.
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>, LogError>;
}

/// Options for log streaming.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Include stdout.
    pub stdout: bool,
    /// Include stderr.
    pub stderr: bool,
    /// Keep the stream open until the container exits.
    pub follow: bool,
    /// Number of lines to show from the end (None = all).
    pub tail: Option<u64>,
}

impl LogOptions {
    /// Follow both streams from the start, as used for build tool containers.
    pub fn follow_all() -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: true,
            tail: None,
        }
    }
}

/// A chunk of output from a container.
#[derive(Debug, Clone)]
pub struct LogLine {
    /// The log content.
    pub content: String,
    /// Whether this is from stdout or stderr.
    pub stream: LogStream,
}

/// Log stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Errors from log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
