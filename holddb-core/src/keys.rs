//! Sorted list of primary keys
//!
//! Used as the dedup accumulator threaded through OR-branch traversal and as
//! the value stored under each secondary index entry.

use serde::{Deserialize, Serialize};

/// Set of primary keys kept in ascending byte order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyList(Vec<Vec<u8>>);

impl KeyList {
    /// Create an empty list
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Check if `key` is present
    pub fn contains(&self, key: &[u8]) -> bool {
        self.position(key).is_ok()
    }

    /// Add `key`; returns false if it was already present
    pub fn insert(&mut self, key: Vec<u8>) -> bool {
        match self.position(&key) {
            Ok(_) => false,
            Err(pos) => {
                self.0.insert(pos, key);
                true
            }
        }
    }

    /// Remove `key`; returns false if it was not present
    pub fn remove(&mut self, key: &[u8]) -> bool {
        match self.position(key) {
            Ok(pos) => {
                self.0.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the list holds no keys
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in ascending order
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.0.iter().map(Vec::as_slice)
    }

    fn position(&self, key: &[u8]) -> Result<usize, usize> {
        self.0.binary_search_by(|k| k.as_slice().cmp(key))
    }
}

impl Extend<Vec<u8>> for KeyList {
    fn extend<I: IntoIterator<Item = Vec<u8>>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl IntoIterator for KeyList {
    type Item = Vec<u8>;
    type IntoIter = std::vec::IntoIter<Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
