//! System tag enforcement.
//!
//! Callers may attach any tags they like, except that the reserved keys
//! always carry exactly one value computed by the system.

use tracing::debug;

use crate::config::TagKeys;
use crate::types::Tag;

/// The system computed values for the reserved tag keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTags {
    pub org: String,
    pub space: String,
    pub name: String,
    /// Only set for principals that act on a sub-resource.
    pub resource_name: Option<String>,
}

impl SystemTags {
    pub fn repository(org: impl Into<String>, space: impl Into<String>, name: impl Into<String>) -> Self {
        SystemTags {
            org: org.into(),
            space: space.into(),
            name: name.into(),
            resource_name: None,
        }
    }

    pub fn user(
        org: impl Into<String>,
        space: impl Into<String>,
        resource: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        SystemTags {
            org: org.into(),
            space: space.into(),
            name: name.into(),
            resource_name: Some(resource.into()),
        }
    }

    /// Reserved tags in append order: name, resource name, org, space.
    pub fn reserved(&self, keys: &TagKeys) -> Vec<Tag> {
        let mut reserved = vec![Tag::new(keys.name.as_str(), self.name.as_str())];
        if let Some(resource) = &self.resource_name {
            reserved.push(Tag::new(keys.resource_name.as_str(), resource.as_str()));
        }
        reserved.push(Tag::new(keys.org.as_str(), self.org.as_str()));
        reserved.push(Tag::new(keys.space.as_str(), self.space.as_str()));
        reserved
    }

    /// Drop caller tags using a reserved key, then append the reserved tags.
    pub fn normalize<I: IntoIterator<Item = Tag>>(&self, keys: &TagKeys, tags: I) -> Vec<Tag> {
        let reserved = self.reserved(keys);
        let mut normalized: Vec<Tag> = tags
            .into_iter()
            .filter(|t| !reserved.iter().any(|r| r.key == t.key))
            .collect();
        normalized.extend(reserved);
        debug!(event = "NormalizeTags", phase = "Result", count = normalized.len());
        normalized
    }
}

/// Tags for a repository named `name` in `space`.
pub fn normalize_tags<I: IntoIterator<Item = Tag>>(
    keys: &TagKeys,
    org: &str,
    space: &str,
    name: &str,
    tags: I,
) -> Vec<Tag> {
    SystemTags::repository(org, space, name).normalize(keys, tags)
}

/// Tags for a repository user `name` acting on `resource`.
pub fn normalize_user_tags<I: IntoIterator<Item = Tag>>(
    keys: &TagKeys,
    org: &str,
    space: &str,
    resource: &str,
    name: &str,
    tags: I,
) -> Vec<Tag> {
    SystemTags::user(org, space, resource, name).normalize(keys, tags)
}
