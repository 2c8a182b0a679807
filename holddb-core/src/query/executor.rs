//! Query executor
//!
//! Drives a [`KeyScan`] over one record bucket, checks every candidate against
//! the query and then walks each OR-branch with the keys already handled, so a
//! record is never selected or deleted twice by one request.

use super::scan::{IndexPolicy, KeyScan, RangePolicy, DEFAULT_SCAN_BATCH_SIZE};
use super::{Query, QueryError};
use crate::codec::Codec;
use crate::index::remove_from_all_indexes;
use crate::keys::KeyList;
use crate::record::Record;
use crate::store::{ReadTx, WriteTx};
use tracing::debug;

/// Runs select and delete traversals inside a caller-supplied transaction
pub struct QueryExecutor {
    codec: Codec,
    batch_size: usize,
    policy: Box<dyn IndexPolicy>,
}

impl QueryExecutor {
    /// Create an executor using `codec` for records and keys
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            batch_size: DEFAULT_SCAN_BATCH_SIZE,
            policy: Box::new(RangePolicy),
        }
    }

    /// Set the number of entries pulled from the store per batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Replace the policy deciding when an index narrows a scan
    pub fn with_policy(mut self, policy: impl IndexPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Codec used for records and keys
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Append every record matching `query` to `out`.
    ///
    /// `None` matches every record. Keys found in `matched` are skipped, and
    /// every key appended is added to it.
    pub fn select_matching<R, E, T>(
        &self,
        tx: &T,
        out: &mut Vec<E>,
        query: Option<&Query>,
        matched: &mut KeyList,
    ) -> Result<(), QueryError>
    where
        R: Record,
        E: From<R>,
        T: ReadTx + ?Sized,
    {
        self.visit_matching::<R, T, _>(tx, query, matched, &mut |record| {
            out.push(E::from(record));
            true
        })?;
        Ok(())
    }

    /// First record matching `query` in scan order; the scan stops there
    pub fn first_matching<R, T>(
        &self,
        tx: &T,
        query: Option<&Query>,
    ) -> Result<Option<R>, QueryError>
    where
        R: Record,
        T: ReadTx + ?Sized,
    {
        let mut first = None;
        self.visit_matching::<R, T, _>(tx, query, &mut KeyList::new(), &mut |record| {
            first = Some(record);
            false
        })?;
        Ok(first)
    }

    /// Number of records matching `query`, without collecting them
    pub fn count_matching<R, T>(&self, tx: &T, query: Option<&Query>) -> Result<usize, QueryError>
    where
        R: Record,
        T: ReadTx + ?Sized,
    {
        let mut matched = KeyList::new();
        self.visit_matching::<R, T, _>(tx, query, &mut matched, &mut |_| true)?;
        Ok(matched.len())
    }

    /// Hand each matching record to `visit` until it returns `false`.
    ///
    /// Returns `false` when the traversal was stopped early.
    fn visit_matching<R, T, F>(
        &self,
        tx: &T,
        query: Option<&Query>,
        matched: &mut KeyList,
        visit: &mut F,
    ) -> Result<bool, QueryError>
    where
        R: Record,
        T: ReadTx + ?Sized,
        F: FnMut(R) -> bool,
    {
        let empty;
        let query = match query {
            Some(query) => query,
            None => {
                empty = Query::new();
                &empty
            }
        };

        let mut scan = self.open_scan::<R>(query);
        let index_usable = scan.index_usable();
        let before = matched.len();

        while let Some((key, raw)) = scan.next(tx, &self.codec) {
            if !matched.is_empty() && matched.contains(&key) {
                continue;
            }

            let record: R = self.codec.decode(&raw)?;
            if query.matches_all_fields(&key, &record, &self.codec, index_usable)? {
                matched.insert(key);
                if !visit(record) {
                    return Ok(false);
                }
            }
        }
        scan.finish()?;

        debug!(
            bucket = R::bucket(),
            index_usable,
            matched = matched.len() - before,
            branches = query.or_branches().len(),
            "Selected records"
        );

        for branch in query.or_branches() {
            if !self.visit_matching::<R, T, F>(tx, Some(branch), matched, visit)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Delete every record matching `query` along with its index entries.
    ///
    /// Deleted keys are added to `deleted`. A failure leaves earlier deletions
    /// in place; the enclosing transaction decides whether they persist.
    pub fn delete_matching<R, T>(
        &self,
        tx: &mut T,
        query: Option<&Query>,
        deleted: &mut KeyList,
    ) -> Result<(), QueryError>
    where
        R: Record,
        T: WriteTx + ?Sized,
    {
        let empty;
        let query = match query {
            Some(query) => query,
            None => {
                empty = Query::new();
                &empty
            }
        };

        let mut scan = self.open_scan::<R>(query);
        let index_usable = scan.index_usable();
        let before = deleted.len();

        while let Some((key, raw)) = scan.next(&*tx, &self.codec) {
            if !deleted.is_empty() && deleted.contains(&key) {
                continue;
            }

            let record: R = self.codec.decode(&raw)?;
            if query.matches_all_fields(&key, &record, &self.codec, index_usable)? {
                tx.delete(R::bucket(), &key)?;
                remove_from_all_indexes(tx, &self.codec, &key, &record)?;
                deleted.insert(key);
            }
        }
        scan.finish()?;

        debug!(
            bucket = R::bucket(),
            index_usable,
            deleted = deleted.len() - before,
            branches = query.or_branches().len(),
            "Deleted records"
        );

        for branch in query.or_branches() {
            self.delete_matching::<R, T>(tx, Some(branch), deleted)?;
        }
        Ok(())
    }

    fn open_scan<R: Record>(&self, query: &Query) -> KeyScan {
        KeyScan::open(
            R::bucket(),
            R::indexes(),
            query,
            self.policy.as_ref(),
            self.batch_size,
        )
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(Codec::default())
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("codec", &self.codec)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}
