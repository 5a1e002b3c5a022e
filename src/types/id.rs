// ABOUTME: Phantom-typed identifiers for runtime objects.
// ABOUTME: Keeps container IDs and image IDs from being passed for one another.

use serde::{Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

pub enum ContainerMarker {}
pub enum ImageMarker {}

/// Length of the abbreviated ID Docker prints and uses as a container hostname.
const SHORT_LEN: usize = 12;

/// Identifier of a runtime object, tagged with the kind of object it names.
#[must_use = "IDs reference runtime objects and should not be ignored"]
pub struct Id<T> {
    value: String,
    _kind: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _kind: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The abbreviated form (first 12 characters).
    pub fn short(&self) -> &str {
        let end = self
            .value
            .char_indices()
            .nth(SHORT_LEN)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len());
        &self.value[..end]
    }

    /// Whether `prefix` abbreviates this ID. Empty prefixes never match.
    pub fn starts_with(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.value.starts_with(prefix)
    }
}

// T is only a marker, so none of these may require bounds on it.

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

pub type ContainerId = Id<ContainerMarker>;
pub type ImageId = Id<ImageMarker>;
