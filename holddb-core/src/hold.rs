//! Hold: typed records over a store
//!
//! A [`Hold`] owns the store and the query executor. Each operation comes in
//! two forms: one that runs in its own transaction and commits on success, and
//! a `tx_` form that runs inside a transaction supplied by the caller.

use crate::codec::{Codec, CodecError};
use crate::config::HoldConfig;
use crate::index::{add_to_indexes, remove_from_all_indexes, update_indexes, IndexError};
use crate::keys::KeyList;
use crate::logging::SlowQueryLogger;
use crate::query::{Query, QueryError, QueryExecutor};
use crate::record::Record;
use crate::store::{MemoryStore, ReadTx, ReadTxn, StoreError, WriteTx, WriteTxn};
use serde::Serialize;
use tracing::{debug, info};

/// Typed record store with query support
#[derive(Debug)]
pub struct Hold {
    store: MemoryStore,
    executor: QueryExecutor,
    slow_queries: SlowQueryLogger,
    config: HoldConfig,
}

impl Hold {
    /// Open an empty hold with `config`
    pub fn open(config: HoldConfig) -> Result<Self, HoldError> {
        config
            .validate()
            .map_err(|e| HoldError::Config(e.to_string()))?;

        info!(
            codec = ?config.store.codec,
            scan_batch_size = config.store.scan_batch_size,
            "Opened hold"
        );
        Ok(Self::with_config(config))
    }

    fn with_config(config: HoldConfig) -> Self {
        let executor = QueryExecutor::new(config.store.codec)
            .with_batch_size(config.store.scan_batch_size);

        Self {
            store: MemoryStore::new(),
            executor,
            slow_queries: SlowQueryLogger::from_settings(&config.logging),
            config,
        }
    }

    /// Configuration the hold was opened with
    pub fn config(&self) -> &HoldConfig {
        &self.config
    }

    /// Underlying store
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Executor running the select and delete traversals
    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    fn codec(&self) -> Codec {
        self.executor.codec()
    }

    /// Begin a read-only transaction
    pub fn begin_read(&self) -> ReadTxn {
        self.store.begin_read()
    }

    /// Begin a read-write transaction
    pub fn begin_write(&self) -> WriteTxn<'_> {
        self.store.begin_write()
    }

    /// Insert `record` under `key`; fails if the key is taken
    pub fn insert<R: Record, K: Serialize + ?Sized>(&self, key: &K, record: &R) -> Result<(), HoldError> {
        let mut tx = self.begin_write();
        self.tx_insert(&mut tx, key, record)?;
        tx.commit();
        Ok(())
    }

    /// Insert inside `tx`
    pub fn tx_insert<R, K, T>(&self, tx: &mut T, key: &K, record: &R) -> Result<(), HoldError>
    where
        R: Record,
        K: Serialize + ?Sized,
        T: WriteTx + ?Sized,
    {
        let codec = self.codec();
        let key = codec.encode(key)?;

        if tx.get(R::bucket(), &key)?.is_some() {
            return Err(HoldError::KeyExists);
        }

        tx.put(R::bucket(), &key, &codec.encode(record)?)?;
        add_to_indexes(tx, &codec, &key, record)?;
        Ok(())
    }

    /// Replace the record stored under `key`; fails if there is none
    pub fn update<R: Record, K: Serialize + ?Sized>(&self, key: &K, record: &R) -> Result<(), HoldError> {
        let mut tx = self.begin_write();
        self.tx_update(&mut tx, key, record)?;
        tx.commit();
        Ok(())
    }

    /// Update inside `tx`
    pub fn tx_update<R, K, T>(&self, tx: &mut T, key: &K, record: &R) -> Result<(), HoldError>
    where
        R: Record,
        K: Serialize + ?Sized,
        T: WriteTx + ?Sized,
    {
        let codec = self.codec();
        let key = codec.encode(key)?;

        let old: R = self.load(&*tx, &key)?.ok_or(HoldError::NotFound)?;
        tx.put(R::bucket(), &key, &codec.encode(record)?)?;
        update_indexes(tx, &codec, &key, Some(&old), record)?;
        Ok(())
    }

    /// Insert or replace the record stored under `key`
    pub fn upsert<R: Record, K: Serialize + ?Sized>(&self, key: &K, record: &R) -> Result<(), HoldError> {
        let mut tx = self.begin_write();
        self.tx_upsert(&mut tx, key, record)?;
        tx.commit();
        Ok(())
    }

    /// Upsert inside `tx`
    pub fn tx_upsert<R, K, T>(&self, tx: &mut T, key: &K, record: &R) -> Result<(), HoldError>
    where
        R: Record,
        K: Serialize + ?Sized,
        T: WriteTx + ?Sized,
    {
        let codec = self.codec();
        let key = codec.encode(key)?;

        let old: Option<R> = self.load(&*tx, &key)?;
        tx.put(R::bucket(), &key, &codec.encode(record)?)?;
        update_indexes(tx, &codec, &key, old.as_ref(), record)?;
        Ok(())
    }

    /// Delete the record stored under `key`; fails if there is none
    pub fn delete<R: Record, K: Serialize + ?Sized>(&self, key: &K) -> Result<(), HoldError> {
        let mut tx = self.begin_write();
        self.tx_delete::<R, K, _>(&mut tx, key)?;
        tx.commit();
        Ok(())
    }

    /// Delete inside `tx`
    pub fn tx_delete<R, K, T>(&self, tx: &mut T, key: &K) -> Result<(), HoldError>
    where
        R: Record,
        K: Serialize + ?Sized,
        T: WriteTx + ?Sized,
    {
        let codec = self.codec();
        let key = codec.encode(key)?;

        let old: R = self.load(&*tx, &key)?.ok_or(HoldError::NotFound)?;
        tx.delete(R::bucket(), &key)?;
        remove_from_all_indexes(tx, &codec, &key, &old)?;
        Ok(())
    }

    /// Record stored under `key`
    pub fn get<R: Record, K: Serialize + ?Sized>(&self, key: &K) -> Result<Option<R>, HoldError> {
        self.tx_get(&self.begin_read(), key)
    }

    /// Get inside `tx`
    pub fn tx_get<R, K, T>(&self, tx: &T, key: &K) -> Result<Option<R>, HoldError>
    where
        R: Record,
        K: Serialize + ?Sized,
        T: ReadTx + ?Sized,
    {
        let key = self.codec().encode(key)?;
        self.load(tx, &key)
    }

    /// Every record matching `query`; `None` matches all
    pub fn find<R: Record>(&self, query: Option<&Query>) -> Result<Vec<R>, HoldError> {
        self.tx_find(&self.begin_read(), query)
    }

    /// Find inside `tx`
    pub fn tx_find<R, T>(&self, tx: &T, query: Option<&Query>) -> Result<Vec<R>, HoldError>
    where
        R: Record,
        T: ReadTx + ?Sized,
    {
        let tracker = self.slow_queries.start();
        let mut out = Vec::new();
        self.executor
            .select_matching::<R, R, T>(tx, &mut out, query, &mut KeyList::new())?;
        self.track::<R>(tracker, query);
        Ok(out)
    }

    /// First record matching `query` in scan order
    pub fn find_one<R: Record>(&self, query: Option<&Query>) -> Result<Option<R>, HoldError> {
        self.tx_find_one(&self.begin_read(), query)
    }

    /// Find one inside `tx`; the scan stops at the first match
    pub fn tx_find_one<R, T>(&self, tx: &T, query: Option<&Query>) -> Result<Option<R>, HoldError>
    where
        R: Record,
        T: ReadTx + ?Sized,
    {
        let tracker = self.slow_queries.start();
        let found = self.executor.first_matching::<R, T>(tx, query)?;
        self.track::<R>(tracker, query);
        Ok(found)
    }

    /// Number of records matching `query`
    pub fn count<R: Record>(&self, query: Option<&Query>) -> Result<usize, HoldError> {
        self.tx_count::<R, _>(&self.begin_read(), query)
    }

    /// Count inside `tx`
    pub fn tx_count<R, T>(&self, tx: &T, query: Option<&Query>) -> Result<usize, HoldError>
    where
        R: Record,
        T: ReadTx + ?Sized,
    {
        let tracker = self.slow_queries.start();
        let count = self.executor.count_matching::<R, T>(tx, query)?;
        self.track::<R>(tracker, query);
        Ok(count)
    }

    /// Delete every record matching `query`; returns how many were deleted
    pub fn delete_matching<R: Record>(&self, query: Option<&Query>) -> Result<usize, HoldError> {
        let mut tx = self.begin_write();
        let deleted = self.tx_delete_matching::<R, _>(&mut tx, query)?;
        tx.commit();
        Ok(deleted)
    }

    /// Delete matching inside `tx`
    pub fn tx_delete_matching<R, T>(&self, tx: &mut T, query: Option<&Query>) -> Result<usize, HoldError>
    where
        R: Record,
        T: WriteTx + ?Sized,
    {
        let tracker = self.slow_queries.start();
        let mut deleted = KeyList::new();
        self.executor.delete_matching::<R, T>(tx, query, &mut deleted)?;
        self.track::<R>(tracker, query);

        debug!(bucket = R::bucket(), deleted = deleted.len(), "Deleted matching records");
        Ok(deleted.len())
    }

    fn load<R, T>(&self, tx: &T, key: &[u8]) -> Result<Option<R>, HoldError>
    where
        R: Record,
        T: ReadTx + ?Sized,
    {
        let codec = self.codec();
        match tx.get(R::bucket(), key)? {
            Some(raw) => Ok(Some(codec.decode(&raw)?)),
            None => Ok(None),
        }
    }

    fn track<R: Record>(&self, tracker: crate::logging::QueryTracker, query: Option<&Query>) {
        match query {
            Some(query) => self.slow_queries.finish(tracker, R::bucket(), query),
            None => self.slow_queries.finish(tracker, R::bucket(), &Query::new()),
        };
    }
}

impl Default for Hold {
    fn default() -> Self {
        Self::with_config(HoldConfig::default())
    }
}

/// Hold errors
#[derive(Debug, thiserror::Error)]
pub enum HoldError {
    #[error("This key already exists in the hold")]
    KeyExists,

    #[error("No data found for this key")]
    NotFound,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::where_;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Account {
        owner: String,
        balance: i64,
    }

    crate::impl_record!(Account, bucket = "Account",
        fields { "Owner" => owner, "Balance" => balance },
        indexes ["Owner"]);

    fn account(owner: &str, balance: i64) -> Account {
        Account {
            owner: owner.to_string(),
            balance,
        }
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let mut config = HoldConfig::default();
        config.store.scan_batch_size = 0;
        assert!(matches!(Hold::open(config), Err(HoldError::Config(_))));
    }

    #[test]
    fn test_default_matches_default_config() {
        let hold = Hold::default();
        let defaults = HoldConfig::default();
        assert_eq!(hold.config().store.scan_batch_size, defaults.store.scan_batch_size);
        assert_eq!(hold.executor().codec(), defaults.store.codec);
    }

    #[test]
    fn test_find_one_and_count() {
        let hold = Hold::default();
        hold.insert(&1u32, &account("ann", 10)).unwrap();
        hold.insert(&2u32, &account("bob", 5)).unwrap();
        hold.insert(&3u32, &account("ann", 7)).unwrap();

        let ann = where_("Owner").unwrap().eq("ann");
        assert_eq!(hold.find_one::<Account>(Some(&ann)).unwrap(), Some(account("ann", 10)));
        assert_eq!(hold.count::<Account>(Some(&ann)).unwrap(), 2);

        let nobody = where_("Owner").unwrap().eq("cy");
        assert!(hold.find_one::<Account>(Some(&nobody)).unwrap().is_none());

        let tx = hold.begin_read();
        let first: Option<Account> = hold.tx_find_one(&tx, None).unwrap();
        assert_eq!(first, Some(account("ann", 10)));
    }

    #[test]
    fn test_insert_get_and_key_exists() {
        let hold = Hold::default();
        hold.insert(&"a-1", &account("ann", 10)).unwrap();

        let got: Option<Account> = hold.get(&"a-1").unwrap();
        assert_eq!(got, Some(account("ann", 10)));
        assert!(hold.get::<Account, _>(&"a-2").unwrap().is_none());

        let err = hold.insert(&"a-1", &account("bob", 1)).unwrap_err();
        assert!(matches!(err, HoldError::KeyExists));
    }

    #[test]
    fn test_update_moves_index_entry() {
        let hold = Hold::default();
        hold.insert(&1u32, &account("ann", 10)).unwrap();
        hold.update(&1u32, &account("bob", 10)).unwrap();

        let ann = where_("Owner").unwrap().eq("ann");
        let bob = where_("Owner").unwrap().eq("bob");
        assert_eq!(hold.count::<Account>(Some(&ann)).unwrap(), 0);
        assert_eq!(hold.count::<Account>(Some(&bob)).unwrap(), 1);

        let err = hold.update(&2u32, &account("cy", 0)).unwrap_err();
        assert!(matches!(err, HoldError::NotFound));
    }

    #[test]
    fn test_delete_requires_existing_key() {
        let hold = Hold::default();
        hold.upsert(&1u32, &account("ann", 10)).unwrap();
        hold.delete::<Account, _>(&1u32).unwrap();

        let err = hold.delete::<Account, _>(&1u32).unwrap_err();
        assert!(matches!(err, HoldError::NotFound));
        assert_eq!(hold.store().bucket_len("_index:Account:Owner"), 0);
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let hold = Hold::default();
        {
            let mut tx = hold.begin_write();
            hold.tx_insert(&mut tx, &1u32, &account("ann", 10)).unwrap();
            assert!(hold.tx_insert(&mut tx, &1u32, &account("ann", 10)).is_err());
        }
        assert_eq!(hold.count::<Account>(None).unwrap(), 0);
    }
}
