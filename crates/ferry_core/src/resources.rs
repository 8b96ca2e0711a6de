use crate::error::ExtractError;

use std::collections::HashSet;
use std::collections::hash_set;
use std::path::{Component, Path};

/// Separator used in asset paths, independent of the host platform.
pub const SEPARATOR: char = '/';

/// The set of asset paths a deployment is responsible for.
///
/// Callers fill it before the extraction starts. While a run is in progress the worker
/// adds every child it discovers under a directory entry, so the purge that follows a
/// failure knows about them too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSet {
    entries: HashSet<String>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the path was already a member.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.entries.insert(path.into())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> hash_set::Iter<'_, String> {
        self.entries.iter()
    }
}

impl<S: Into<String>> Extend<S> for ResourceSet {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        self.entries.extend(iter.into_iter().map(Into::into));
    }
}

impl<S: Into<String>> FromIterator<S> for ResourceSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a ResourceSet {
    type Item = &'a String;
    type IntoIter = hash_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Joins a child name onto an asset path, tolerating a trailing separator on `parent`.
pub fn child_path(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches(SEPARATOR);
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}{SEPARATOR}{child}")
    }
}

/// Checks that `path` stays inside whatever directory it is later joined onto.
///
/// Only plain relative paths are accepted: no root, no drive prefix, no `.` or `..`.
pub fn validate_resource_path(path: &str) -> Result<&Path, ExtractError> {
    let relative = Path::new(path);
    if path.is_empty() {
        return Err(ExtractError::InvalidPath("empty path".into()));
    }

    if relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        Ok(relative)
    } else {
        Err(ExtractError::InvalidPath(path.to_string()))
    }
}
