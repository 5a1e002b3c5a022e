// ABOUTME: Diagnostics accumulator for non-fatal warnings during pipeline operations.
// ABOUTME: Collects failures that must not block a reset but should be shown to users.

use serde::Serialize;

/// Collects non-fatal warnings during pipeline operations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during a pipeline operation.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A container that could not be stopped or removed.
    pub fn container_stop(container: &str, error: impl std::fmt::Display) -> Self {
        Self {
            kind: WarningKind::ContainerStop,
            message: format!("failed to stop {}: {}", container, error),
        }
    }

    /// Project directory contents that could not be removed.
    pub fn workspace_cleanup(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::WorkspaceCleanup,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during pipeline operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A project container survived a best-effort stop.
    ContainerStop,
    /// The project directory was not fully cleared.
    WorkspaceCleanup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::container_stop("shop_web_1", "permission denied"));
        diag.warn(Warning::workspace_cleanup("project directory is read-only"));

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
        assert_eq!(
            diag.warnings()[0].message,
            "failed to stop shop_web_1: permission denied"
        );
    }

    #[test]
    fn warning_constructors_set_correct_kind() {
        assert_eq!(
            Warning::container_stop("x", "y").kind,
            WarningKind::ContainerStop
        );
        assert_eq!(
            Warning::workspace_cleanup("test").kind,
            WarningKind::WorkspaceCleanup
        );
    }
}
