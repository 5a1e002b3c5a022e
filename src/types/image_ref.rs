// ABOUTME: Container image references for pinned build tools and built project images.
// ABOUTME: Parses `name`, `name:tag`, and `registry/name:tag@digest` forms.

use crate::types::ProjectName;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Repository namespace for images the builder produces.
const BUILD_NAMESPACE: &str = "dockhand";

#[derive(Debug, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    registry: Option<String>,
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || "/:.-_@".contains(*c)))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        let (rest, digest) = match input.split_once('@') {
            Some((rest, digest)) if !digest.is_empty() => (rest, Some(digest.to_string())),
            Some(_) => return Err(ParseImageRefError::InvalidFormat(input.to_string())),
            None => (input, None),
        };

        // A colon followed by a slash belongs to a registry port, not a tag.
        let (rest, tag) = match rest.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => (name, Some(tag.to_string())),
            _ => (rest, None),
        };

        if rest.is_empty() || rest.ends_with('/') || tag.as_deref() == Some("") {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        let (registry, name) = match rest.split_once('/') {
            Some((first, name))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), name.to_string())
            }
            _ => (None, rest.to_string()),
        };

        let tag = if tag.is_none() && digest.is_none() {
            Some("latest".to_string())
        } else {
            tag
        };

        Ok(Self {
            registry,
            name,
            tag,
            digest,
        })
    }

    /// The image a build strategy tags its output with: `dockhand/<project><suffix>:latest`.
    pub fn for_project(project: &ProjectName, suffix: &str) -> Self {
        Self {
            registry: None,
            name: format!("{}/{}{}", BUILD_NAMESPACE, project, suffix),
            tag: Some("latest".to_string()),
            digest: None,
        }
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Reference without the tag, as the commit API expects for `repo`.
    pub fn repository(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repository())?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ImageRef::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pinned_tool_image() {
        let image = ImageRef::parse("docker/compose:1.22.0").unwrap();
        assert_eq!(image.registry(), None);
        assert_eq!(image.name(), "docker/compose");
        assert_eq!(image.tag(), Some("1.22.0"));
    }

    #[test]
    fn parses_registry_with_port() {
        let image = ImageRef::parse("localhost:5000/app").unwrap();
        assert_eq!(image.registry(), Some("localhost:5000"));
        assert_eq!(image.name(), "app");
        assert_eq!(image.tag(), Some("latest"));
    }

    #[test]
    fn keeps_digest_without_default_tag() {
        let image = ImageRef::parse("ghcr.io/org/app@sha256:abc").unwrap();
        assert_eq!(image.tag(), None);
        assert_eq!(image.digest(), Some("sha256:abc"));
        assert_eq!(image.to_string(), "ghcr.io/org/app@sha256:abc");
    }

    #[test]
    fn rejects_malformed_references() {
        assert!(matches!(ImageRef::parse(" "), Err(ParseImageRefError::Empty)));
        assert!(matches!(
            ImageRef::parse("app name"),
            Err(ParseImageRefError::InvalidChar(' '))
        ));
        assert!(matches!(
            ImageRef::parse("app:"),
            Err(ParseImageRefError::InvalidFormat(_))
        ));
    }

    #[test]
    fn project_images_are_namespaced() {
        let project = ProjectName::new("shop").unwrap();
        let image = ImageRef::for_project(&project, "-herokuish");
        assert_eq!(image.to_string(), "dockhand/shop-herokuish:latest");
        assert_eq!(image.repository(), "dockhand/shop-herokuish");
    }
}
