// ABOUTME: Validated project name used for container names, labels, and image tags.
// ABOUTME: Follows the compose project-name rules so every build strategy accepts it.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectNameError {
    #[error("project name cannot be empty")]
    Empty,

    #[error("project name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("project name must start with a lowercase letter or digit")]
    BadStart,

    #[error("invalid character in project name: '{0}'")]
    InvalidChar(char),

    #[error("project name must end with a lowercase letter or digit")]
    BadEnd,

    #[error("invalid separator in project name: '{0}' (use '-', '_' or '__')")]
    BadSeparator(String),
}

fn is_alnum(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

/// Separators allowed between alphanumerics in an image repository name.
fn is_valid_separator(run: &str) -> bool {
    run == "_" || run == "__" || (!run.is_empty() && run.chars().all(|c| c == '-'))
}

/// Name of the single project a daemon manages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProjectName(String);

impl ProjectName {
    pub fn new(value: &str) -> Result<Self, ProjectNameError> {
        let first = value.chars().next().ok_or(ProjectNameError::Empty)?;

        if value.len() > 63 {
            return Err(ProjectNameError::TooLong);
        }

        if !is_alnum(first) {
            return Err(ProjectNameError::BadStart);
        }

        if let Some(c) = value
            .chars()
            .find(|c| !(is_alnum(*c) || *c == '-' || *c == '_'))
        {
            return Err(ProjectNameError::InvalidChar(c));
        }

        if !value.ends_with(is_alnum) {
            return Err(ProjectNameError::BadEnd);
        }

        if let Some(run) = value
            .split(is_alnum)
            .find(|run| !run.is_empty() && !is_valid_separator(run))
        {
            return Err(ProjectNameError::BadSeparator(run.to_string()));
        }

        Ok(Self(value.to_string()))
    }

    /// Derive a project name from a directory. Letters are lowercased, other
    /// characters become `-`, separators at either end are dropped and a run
    /// that image names would reject collapses to a single `-`.
    pub fn from_directory(dir: &Path) -> Result<Self, ProjectNameError> {
        let raw = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mut cleaned = String::with_capacity(raw.len());
        let mut run = String::new();
        for c in raw.chars() {
            if is_alnum(c) {
                if !cleaned.is_empty() && !run.is_empty() {
                    cleaned.push_str(if is_valid_separator(&run) { &run } else { "-" });
                }
                run.clear();
                cleaned.push(c);
            } else if c == '_' {
                run.push('_');
            } else {
                run.push('-');
            }
        }
        Self::new(&cleaned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProjectName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ProjectName::new(&s).map_err(serde::de::Error::custom)
    }
}
