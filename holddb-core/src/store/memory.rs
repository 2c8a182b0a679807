//! In-memory ordered store
//!
//! Read transactions hold an immutable snapshot. A write transaction holds the
//! single writer lock, works on a private copy of the buckets, and publishes it
//! on commit. Dropping a write transaction without committing rolls it back.

use super::{Entry, KeyRange, ReadTx, StoreError, WriteTx};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

type Bucket = BTreeMap<Vec<u8>, Vec<u8>>;
type Buckets = BTreeMap<String, Bucket>;

/// In-memory store of named, sorted buckets
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Last committed state
    snapshot: RwLock<Arc<Buckets>>,
    /// Serializes write transactions
    writer: Mutex<()>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a read-only transaction over the last committed state
    pub fn begin_read(&self) -> ReadTxn {
        ReadTxn {
            snapshot: self.snapshot.read().clone(),
        }
    }

    /// Begin a read-write transaction, waiting for any other writer to finish
    pub fn begin_write(&self) -> WriteTxn<'_> {
        let guard = self.writer.lock();
        let working = (**self.snapshot.read()).clone();
        WriteTxn {
            store: self,
            working,
            _guard: guard,
        }
    }

    /// Number of committed entries in a bucket
    pub fn bucket_len(&self, bucket: &str) -> usize {
        self.snapshot
            .read()
            .get(bucket)
            .map(|b| b.len())
            .unwrap_or(0)
    }

    /// Names of the committed buckets
    pub fn bucket_names(&self) -> Vec<String> {
        self.snapshot.read().keys().cloned().collect()
    }
}

/// Read-only transaction
#[derive(Debug, Clone)]
pub struct ReadTxn {
    snapshot: Arc<Buckets>,
}

impl ReadTx for ReadTxn {
    fn scan(&self, bucket: &str, range: &KeyRange, limit: usize) -> Result<Vec<Entry>, StoreError> {
        scan_buckets(&self.snapshot, bucket, range, limit)
    }

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        get_from_buckets(&self.snapshot, bucket, key)
    }
}

/// Read-write transaction
pub struct WriteTxn<'a> {
    store: &'a MemoryStore,
    working: Buckets,
    _guard: MutexGuard<'a, ()>,
}

impl WriteTxn<'_> {
    /// Publish every write made in this transaction
    pub fn commit(self) {
        let WriteTxn {
            store,
            working,
            _guard,
        } = self;
        let buckets = working.len();
        *store.snapshot.write() = Arc::new(working);
        debug!(buckets, "Committed write transaction");
    }

    /// Discard every write made in this transaction
    pub fn rollback(self) {
        debug!("Rolled back write transaction");
    }
}

impl ReadTx for WriteTxn<'_> {
    fn scan(&self, bucket: &str, range: &KeyRange, limit: usize) -> Result<Vec<Entry>, StoreError> {
        scan_buckets(&self.working, bucket, range, limit)
    }

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        get_from_buckets(&self.working, bucket, key)
    }
}

impl WriteTx for WriteTxn<'_> {
    fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        check_names(bucket, key)?;
        self.working
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<(), StoreError> {
        check_names(bucket, key)?;
        if let Some(b) = self.working.get_mut(bucket) {
            b.remove(key);
        }
        Ok(())
    }
}

fn check_names(bucket: &str, key: &[u8]) -> Result<(), StoreError> {
    if bucket.is_empty() {
        return Err(StoreError::EmptyBucketName);
    }
    if key.is_empty() {
        return Err(StoreError::EmptyKey);
    }
    Ok(())
}

fn scan_buckets(
    buckets: &Buckets,
    bucket: &str,
    range: &KeyRange,
    limit: usize,
) -> Result<Vec<Entry>, StoreError> {
    if bucket.is_empty() {
        return Err(StoreError::EmptyBucketName);
    }
    let b = match buckets.get(bucket) {
        Some(b) => b,
        None => return Ok(Vec::new()),
    };
    if range.is_degenerate() {
        return Ok(Vec::new());
    }

    Ok(b
        .range::<Vec<u8>, _>((range.start.as_ref(), range.end.as_ref()))
        .take(limit)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect())
}

fn get_from_buckets(
    buckets: &Buckets,
    bucket: &str,
    key: &[u8],
) -> Result<Option<Vec<u8>>, StoreError> {
    check_names(bucket, key)?;
    Ok(buckets.get(bucket).and_then(|b| b.get(key)).cloned())
}
