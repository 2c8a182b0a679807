//! Key-scan adapter
//!
//! Produces the candidate `(primary key, raw record)` pairs for one query. When
//! the nominated index field is registered for the record type and the
//! [`IndexPolicy`] can turn its criteria into key ranges, only those ranges of
//! the index bucket are walked. Otherwise the whole primary bucket is walked in
//! key order.
//!
//! Entries are pulled from the store in batches and the scan re-seeks after the
//! last key it saw, so the caller may modify the bucket between calls to
//! [`KeyScan::next`].

use super::criterion::{Criterion, Operator};
use super::{Query, QueryError};
use crate::codec::Codec;
use crate::index::{index_bucket, IndexKey};
use crate::keys::KeyList;
use crate::store::{Entry, KeyRange, ReadTx};
use crate::value::Value;
use std::collections::VecDeque;
use std::ops::Bound;
use tracing::{debug, warn};

/// Number of entries pulled from the store per batch
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 100;

/// Decides whether the criteria on an index field can narrow a scan
pub trait IndexPolicy: Send + Sync {
    /// Index key ranges holding every candidate, in ascending order, or `None`
    /// when the index cannot narrow the scan
    fn plan(&self, criteria: &[Criterion]) -> Option<Vec<KeyRange>>;
}

/// Narrows on a single `Eq`, `In` or relational criterion.
///
/// Relational ranges stay inside the operand's comparison family, so index
/// values of another family are never candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangePolicy;

impl IndexPolicy for RangePolicy {
    fn plan(&self, criteria: &[Criterion]) -> Option<Vec<KeyRange>> {
        let criterion = match criteria {
            [] => return Some(vec![KeyRange::all()]),
            [criterion] => criterion,
            _ => return None,
        };

        let range = match criterion.operator() {
            Operator::Eq(v) => KeyRange::exact(encode(v)?),
            Operator::In(values) => {
                let mut keys = values.iter().map(encode).collect::<Option<Vec<_>>>()?;
                keys.sort();
                keys.dedup();
                return Some(keys.into_iter().map(KeyRange::exact).collect());
            }
            Operator::Gt(v) => KeyRange {
                start: Bound::Excluded(encode(v)?),
                end: Bound::Excluded(IndexKey::family_end(v).ok()?),
            },
            Operator::Ge(v) => KeyRange {
                start: Bound::Included(encode(v)?),
                end: Bound::Excluded(IndexKey::family_end(v).ok()?),
            },
            Operator::Lt(v) => KeyRange {
                start: Bound::Included(IndexKey::family_start(v).ok()?),
                end: Bound::Excluded(encode(v)?),
            },
            Operator::Le(v) => KeyRange {
                start: Bound::Included(IndexKey::family_start(v).ok()?),
                end: Bound::Included(encode(v)?),
            },
            Operator::Ne(_) | Operator::Matches(_) | Operator::Predicate(_) => return None,
        };

        Some(vec![range])
    }
}

fn encode(value: &Value) -> Option<Vec<u8>> {
    IndexKey::encode(value).ok().map(IndexKey::into_bytes)
}

enum Source {
    Primary {
        resume: Option<Vec<u8>>,
    },
    Index {
        bucket: String,
        ranges: VecDeque<KeyRange>,
        resume: Option<Vec<u8>>,
    },
}

enum Candidate {
    Loaded(Entry),
    /// Primary key read from an index entry, looked up when reached
    Deferred(Vec<u8>),
}

/// Ordered candidate sequence for one query over one record bucket
pub struct KeyScan {
    bucket: String,
    source: Source,
    batch_size: usize,
    buffer: VecDeque<Candidate>,
    exhausted: bool,
    error: Option<QueryError>,
}

impl KeyScan {
    /// Plan the scan of `bucket` for `query`. `indexes` are the fields of the
    /// record type that carry an index.
    pub fn open(
        bucket: &str,
        indexes: &[&str],
        query: &Query,
        policy: &dyn IndexPolicy,
        batch_size: usize,
    ) -> Self {
        let ranges = query
            .index_field()
            .filter(|field| indexes.contains(field))
            .and_then(|field| {
                policy
                    .plan(query.criteria(field))
                    .map(|ranges| (field, ranges))
            });

        let source = match ranges {
            Some((field, ranges)) => {
                debug!(bucket, index = field, ranges = ranges.len(), "Scanning index");
                Source::Index {
                    bucket: index_bucket(bucket, field),
                    ranges: ranges.into(),
                    resume: None,
                }
            }
            None => {
                debug!(bucket, index = ?query.index_field(), "Scanning primary bucket");
                Source::Primary { resume: None }
            }
        };

        Self {
            bucket: bucket.to_string(),
            source,
            batch_size: batch_size.max(1),
            buffer: VecDeque::new(),
            exhausted: false,
            error: None,
        }
    }

    /// Whether the scan was narrowed by the index, in which case the index
    /// field's criteria already hold for every candidate
    pub fn index_usable(&self) -> bool {
        matches!(self.source, Source::Index { .. })
    }

    /// Next candidate, or `None` once the scan is done or has failed.
    /// [`finish`](Self::finish) reports the failure.
    pub fn next<T: ReadTx + ?Sized>(&mut self, tx: &T, codec: &Codec) -> Option<Entry> {
        loop {
            if self.error.is_some() {
                return None;
            }

            match self.buffer.pop_front() {
                Some(Candidate::Loaded(entry)) => return Some(entry),
                Some(Candidate::Deferred(key)) => match tx.get(&self.bucket, &key) {
                    Ok(Some(raw)) => return Some((key, raw)),
                    Ok(None) => {
                        warn!(bucket = %self.bucket, "Index entry refers to a missing record");
                        continue;
                    }
                    Err(e) => {
                        self.error = Some(e.into());
                        return None;
                    }
                },
                None => {}
            }

            if self.exhausted {
                return None;
            }
            if let Err(e) = self.refill(tx, codec) {
                self.error = Some(e);
            }
        }
    }

    /// Terminal error of the scan, if any
    pub fn finish(self) -> Result<(), QueryError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn refill<T: ReadTx + ?Sized>(&mut self, tx: &T, codec: &Codec) -> Result<(), QueryError> {
        match &mut self.source {
            Source::Primary { resume } => {
                let range = KeyRange::all().resume_after(resume.as_deref());
                let batch = tx.scan(&self.bucket, &range, self.batch_size)?;

                if batch.len() < self.batch_size {
                    self.exhausted = true;
                }
                if let Some((last, _)) = batch.last() {
                    *resume = Some(last.clone());
                }
                self.buffer.extend(batch.into_iter().map(Candidate::Loaded));
            }
            Source::Index {
                bucket,
                ranges,
                resume,
            } => {
                let range = match ranges.front() {
                    Some(range) => range.clone().resume_after(resume.as_deref()),
                    None => {
                        self.exhausted = true;
                        return Ok(());
                    }
                };
                let batch = tx.scan(bucket, &range, self.batch_size)?;

                if batch.len() < self.batch_size {
                    ranges.pop_front();
                    *resume = None;
                } else if let Some((last, _)) = batch.last() {
                    *resume = Some(last.clone());
                }
                for (_, raw) in batch {
                    let keys: KeyList = codec.decode(&raw)?;
                    self.buffer.extend(keys.into_iter().map(Candidate::Deferred));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::add_to_indexes;
    use crate::query::where_;
    use crate::record::Record;
    use crate::store::{MemoryStore, WriteTx};
    use regex::Regex;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Item {
        label: String,
        weight: u32,
    }

    crate::impl_record!(Item, bucket = "Item",
        fields { "Label" => label, "Weight" => weight },
        indexes ["Label", "Weight"]);

    fn seeded(count: u32) -> MemoryStore {
        let store = MemoryStore::new();
        let codec = Codec::Bincode;
        let mut tx = store.begin_write();
        for i in 0..count {
            let item = Item {
                label: format!("item-{:03}", i),
                weight: i % 10,
            };
            let key = codec.encode(&(i as u64)).unwrap();
            tx.put(Item::bucket(), &key, &codec.encode(&item).unwrap()).unwrap();
            add_to_indexes(&mut tx, &codec, &key, &item).unwrap();
        }
        tx.commit();
        store
    }

    fn drain(scan: &mut KeyScan, tx: &impl ReadTx) -> Vec<Item> {
        let codec = Codec::Bincode;
        let mut items = Vec::new();
        while let Some((_, raw)) = scan.next(tx, &codec) {
            items.push(codec.decode::<Item>(&raw).unwrap());
        }
        items
    }

    fn plan(query: &Query, field: &str) -> Option<Vec<KeyRange>> {
        RangePolicy.plan(query.criteria(field))
    }

    #[test]
    fn test_policy_narrowable_operators() {
        assert_eq!(plan(&where_("Weight").unwrap().eq(3u32), "Weight").unwrap().len(), 1);
        assert_eq!(
            plan(&where_("Weight").unwrap().in_([3u32, 1, 3]), "Weight").unwrap().len(),
            2
        );
        assert!(plan(&where_("Weight").unwrap().in_(Vec::<u32>::new()), "Weight")
            .unwrap()
            .is_empty());
        assert!(plan(&where_("Weight").unwrap().ge(3u32), "Weight").is_some());
        assert_eq!(RangePolicy.plan(&[]), Some(vec![KeyRange::all()]));
    }

    #[test]
    fn test_policy_falls_back() {
        assert!(plan(&where_("Weight").unwrap().ne(3u32), "Weight").is_none());
        let re = Regex::new("^item").unwrap();
        assert!(plan(&where_("Label").unwrap().matches(re), "Label").is_none());
        assert!(plan(&where_("Label").unwrap().predicate(|_| Ok(true)), "Label").is_none());

        let two = where_("Weight").unwrap().gt(1u32).and("Weight").unwrap().lt(5u32);
        assert!(plan(&two, "Weight").is_none());
    }

    #[test]
    fn test_full_scan_in_key_order_across_batches() {
        let store = seeded(25);
        let tx = store.begin_read();
        let query = Query::new();

        let mut scan = KeyScan::open("Item", Item::indexes(), &query, &RangePolicy, 4);
        assert!(!scan.index_usable());
        let items = drain(&mut scan, &tx);
        scan.finish().unwrap();

        assert_eq!(items.len(), 25);
        assert_eq!(items[0].label, "item-000");
        assert_eq!(items[24].label, "item-024");
    }

    #[test]
    fn test_index_scan_returns_value_order() {
        let store = seeded(25);
        let tx = store.begin_read();
        let query = where_("Weight").unwrap().ge(8u32);

        let mut scan = KeyScan::open("Item", Item::indexes(), &query, &RangePolicy, 1);
        assert!(scan.index_usable());
        let items = drain(&mut scan, &tx);
        scan.finish().unwrap();

        let weights: Vec<u32> = items.iter().map(|i| i.weight).collect();
        assert_eq!(weights, vec![8, 8, 9, 9]);
    }

    #[test]
    fn test_unregistered_index_falls_back_to_full_scan() {
        let store = seeded(5);
        let tx = store.begin_read();
        let query = where_("Weight").unwrap().eq(1u32);

        let scan = KeyScan::open("Item", &["Label"], &query, &RangePolicy, 10);
        assert!(!scan.index_usable());

        let mut scan = KeyScan::open("Item", Item::indexes(), &query, &RangePolicy, 10);
        assert!(scan.index_usable());
        assert_eq!(drain(&mut scan, &tx).len(), 1);
    }

    #[test]
    fn test_scan_error_is_reported_by_finish() {
        let store = MemoryStore::new();
        let mut tx = store.begin_write();
        tx.put("_index:Item:Weight", &[0x20], b"not a key list").unwrap();

        let query = Query::new().index("Weight").unwrap();
        let mut scan = KeyScan::open("Item", Item::indexes(), &query, &RangePolicy, 10);
        assert!(scan.index_usable());
        assert!(scan.next(&tx, &Codec::Bincode).is_none());
        assert!(matches!(scan.finish(), Err(QueryError::Decode(_))));
    }
}
