//! [`RemapTable`]: source key → target key.

use std::collections::BTreeMap;

use crate::keys::VirtualKey;

/// Mapping from source key to target key.
///
/// Each source maps to at most one target; inserting an existing source
/// replaces its target.  A key with no entry passes through unchanged.
/// Iteration is in ascending source-code order so listings and saved files
/// are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    entries: BTreeMap<VirtualKey, VirtualKey>,
}

impl RemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `source → target`.
    ///
    /// Returns the previous target, if any.
    pub fn insert(&mut self, source: VirtualKey, target: VirtualKey) -> Option<VirtualKey> {
        self.entries.insert(source, target)
    }

    /// Removes the entry for `source`, returning its target if one existed.
    pub fn remove(&mut self, source: VirtualKey) -> Option<VirtualKey> {
        self.entries.remove(&source)
    }

    pub fn get(&self, source: VirtualKey) -> Option<VirtualKey> {
        self.entries.get(&source).copied()
    }

    pub fn contains(&self, source: VirtualKey) -> bool {
        self.entries.contains_key(&source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(source, target)` pairs in ascending source order.
    pub fn iter(&self) -> impl Iterator<Item = (VirtualKey, VirtualKey)> + '_ {
        self.entries.iter().map(|(&s, &t)| (s, t))
    }
}

impl FromIterator<(VirtualKey, VirtualKey)> for RemapTable {
    /// Later pairs overwrite earlier ones with the same source.
    fn from_iter<I: IntoIterator<Item = (VirtualKey, VirtualKey)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<(VirtualKey, VirtualKey)> for RemapTable {
    fn extend<I: IntoIterator<Item = (VirtualKey, VirtualKey)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}
