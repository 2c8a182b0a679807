//! Ordered key-value store capability
//!
//! The query engine only needs transactions over named buckets of sorted
//! key→value pairs. [`ReadTx`] and [`WriteTx`] are that seam; [`MemoryStore`]
//! is the in-process implementation shipped with the crate.

pub mod memory;

pub use memory::{MemoryStore, ReadTxn, WriteTxn};

use std::ops::Bound;

/// A stored key and its raw value
pub type Entry = (Vec<u8>, Vec<u8>);

/// Byte range of keys within a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    /// Lower bound
    pub start: Bound<Vec<u8>>,
    /// Upper bound
    pub end: Bound<Vec<u8>>,
}

impl KeyRange {
    /// Every key in the bucket
    pub fn all() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// Exactly one key
    pub fn exact(key: Vec<u8>) -> Self {
        Self {
            start: Bound::Included(key.clone()),
            end: Bound::Included(key),
        }
    }

    /// Restart the range strictly after `key`, a key previously read from it
    pub fn resume_after(mut self, key: Option<&[u8]>) -> Self {
        if let Some(key) = key {
            self.start = Bound::Excluded(key.to_vec());
        }
        self
    }

    /// Check if no key can fall inside the range
    pub fn is_degenerate(&self) -> bool {
        match (&self.start, &self.end) {
            (Bound::Included(s), Bound::Included(e)) => s > e,
            (Bound::Included(s), Bound::Excluded(e))
            | (Bound::Excluded(s), Bound::Included(e))
            | (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
            _ => false,
        }
    }
}

/// Read access inside a transaction
pub trait ReadTx {
    /// Up to `limit` entries of `bucket` inside `range`, in ascending key order.
    /// A missing bucket has no entries.
    fn scan(&self, bucket: &str, range: &KeyRange, limit: usize) -> Result<Vec<Entry>, StoreError>;

    /// Value stored under `key`
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Write access inside a transaction
pub trait WriteTx: ReadTx {
    /// Store `value` under `key`, creating the bucket if needed
    fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Remove `key`; removing a missing key is not an error
    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<(), StoreError>;
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Bucket name must not be empty")]
    EmptyBucketName,

    #[error("Key must not be empty")]
    EmptyKey,
}
