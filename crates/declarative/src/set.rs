//! Unordered string set attribute
//!
//! Serialized as a sorted array so that two sets with the same members
//! always compare and hash equal, regardless of the order the remote side
//! returned them in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An unordered set of strings with a content-derived hash
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StringSet(BTreeSet<String>);

impl StringSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        self.0.insert(value.into())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.contains(value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Hex digest over the sorted members
    ///
    /// Independent of insertion order and stable across runs.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for member in &self.0 {
            hasher.update(member.as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl<S: Into<String>> FromIterator<S> for StringSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a StringSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
