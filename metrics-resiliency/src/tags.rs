use std::{fmt, str::FromStr};

use metrics::{Label, SharedString};
use thiserror::Error as ThisError;

/// Maximum length, in bytes, of a tag value.
pub const MAX_TAG_VALUE_LEN: usize = 255;

/// Tag dimensions recognized by the resiliency views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKey {
    /// Identity of the application doing the recording.
    AppId,
    /// Namespace of the application, or of the resiliency configuration being loaded.
    Namespace,
    /// Name of the resiliency configuration.
    Name,
    /// Kind of policy that was applied.
    Policy,
    /// Target component, app, or actor guarded by a circuit breaker.
    Component,
}

impl TagKey {
    /// Gets the exported form of this key.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TagKey::AppId => "app_id",
            TagKey::Namespace => "namespace",
            TagKey::Name => "name",
            TagKey::Policy => "policy",
            TagKey::Component => "component",
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of resiliency policy applied around a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PolicyType {
    /// Timeout policy.
    Timeout,
    /// Retry policy.
    Retry,
    /// Circuit breaker policy.
    CircuitBreaker,
}

impl PolicyType {
    /// All policy types, in the order they are applied around a call.
    pub const ALL: [PolicyType; 3] =
        [PolicyType::Timeout, PolicyType::Retry, PolicyType::CircuitBreaker];

    /// Gets the exported form of this policy type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PolicyType::Timeout => "timeout",
            PolicyType::Retry => "retry",
            PolicyType::CircuitBreaker => "circuitbreaker",
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown policy type.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("unknown resiliency policy type `{0}`")]
pub struct ParsePolicyTypeError(String);

impl FromStr for PolicyType {
    type Err = ParsePolicyTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyType::ALL
            .into_iter()
            .find(|policy| policy.as_str() == s)
            .ok_or_else(|| ParsePolicyTypeError(s.to_string()))
    }
}

/// Errors that could occur while building a [`TagSet`].
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum TagError {
    /// The tag value is longer than [`MAX_TAG_VALUE_LEN`].
    #[error("value for tag `{key}` is {len} bytes long, the maximum is 255")]
    ValueTooLong {
        /// Key of the offending tag.
        key: TagKey,
        /// Length of the rejected value.
        len: usize,
    },

    /// The tag value contains characters outside of printable ASCII.
    #[error("value for tag `{key}` contains non-printable characters")]
    NonPrintable {
        /// Key of the offending tag.
        key: TagKey,
    },
}

pub(crate) fn check_value(key: TagKey, value: &str) -> Result<(), TagError> {
    if value.len() > MAX_TAG_VALUE_LEN {
        return Err(TagError::ValueTooLong { key, len: value.len() });
    }
    if !value.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return Err(TagError::NonPrintable { key });
    }
    Ok(())
}

/// Builder for a [`TagSet`].
///
/// Inserting a key that is already present replaces its value.  Values are kept as
/// [`SharedString`]s, so static strings and `Arc`-backed strings are attached to every metric key
/// derived from the set without being copied.
#[derive(Clone, Debug, Default)]
pub struct TagSetBuilder {
    tags: Vec<(TagKey, SharedString)>,
}

impl TagSetBuilder {
    /// Creates an empty `TagSetBuilder`.
    pub fn new() -> Self {
        Self { tags: Vec::with_capacity(4) }
    }

    /// Sets the value of a tag.
    pub fn tag<V>(mut self, key: TagKey, value: V) -> Self
    where
        V: Into<SharedString>,
    {
        let value = value.into();
        match self.tags.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.tags.push((key, value)),
        }
        self
    }

    /// Validates every value and builds the tag set.
    ///
    /// # Errors
    ///
    /// Values longer than [`MAX_TAG_VALUE_LEN`] bytes, or containing anything other than printable
    /// ASCII, are rejected.
    pub fn build(self) -> Result<TagSet, TagError> {
        for (key, value) in &self.tags {
            check_value(*key, value)?;
        }
        Ok(TagSet { tags: self.tags })
    }
}

/// A validated set of tags attached to a single recorded event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<(TagKey, SharedString)>,
}

impl TagSet {
    /// Creates a [`TagSetBuilder`].
    pub fn builder() -> TagSetBuilder {
        TagSetBuilder::new()
    }

    /// Gets the value of a tag, if present.
    pub fn get(&self, key: TagKey) -> Option<&str> {
        self.tags.iter().find(|(k, _)| *k == key).map(|(_, v)| &**v)
    }

    /// Number of tags in this set.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether or not this set is empty.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterates over the tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (TagKey, &str)> {
        self.tags.iter().map(|(k, v)| (*k, &**v))
    }

    /// Projects this set onto `keys`, in the order of `keys`.
    ///
    /// Keys with no value in this set are skipped.
    pub(crate) fn labels_for(&self, keys: &[TagKey]) -> Vec<Label> {
        keys.iter()
            .filter_map(|key| {
                self.tags
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, value)| Label::new(key.as_str(), value.clone()))
            })
            .collect()
    }
}
