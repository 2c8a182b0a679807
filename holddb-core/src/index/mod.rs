//! Secondary indexes
//!
//! Every indexed field of a record type gets its own bucket,
//! `_index:<record bucket>:<field>`, mapping the field's [`IndexKey`] to the
//! [`KeyList`] of primary keys holding that value. Iterating the bucket yields
//! primary keys in value-sorted order.

pub mod key;

pub use key::IndexKey;

use crate::codec::{Codec, CodecError};
use crate::keys::KeyList;
use crate::record::Record;
use crate::store::{StoreError, WriteTx};
use tracing::trace;

/// Name of the bucket holding the index on `field` for records in `bucket`
pub fn index_bucket(bucket: &str, field: &str) -> String {
    format!("_index:{}:{}", bucket, field)
}

/// Record `key` under each indexed field value of `record`
pub fn add_to_indexes<R, T>(tx: &mut T, codec: &Codec, key: &[u8], record: &R) -> Result<(), IndexError>
where
    R: Record,
    T: WriteTx + ?Sized,
{
    for field in R::indexes() {
        let bucket = index_bucket(R::bucket(), field);
        let index_key = index_key_for(record, field)?;

        let mut keys = load_keys(tx, codec, &bucket, &index_key)?;
        if keys.insert(key.to_vec()) {
            tx.put(&bucket, index_key.as_bytes(), &codec.encode(&keys)?)?;
        }
        trace!(index = %bucket, "Added key to index");
    }
    Ok(())
}

/// Remove `key` from every index entry `record` is recorded under
pub fn remove_from_all_indexes<R, T>(
    tx: &mut T,
    codec: &Codec,
    key: &[u8],
    record: &R,
) -> Result<(), IndexError>
where
    R: Record,
    T: WriteTx + ?Sized,
{
    for field in R::indexes() {
        let bucket = index_bucket(R::bucket(), field);
        let index_key = index_key_for(record, field)?;

        let mut keys = load_keys(tx, codec, &bucket, &index_key)?;
        if !keys.remove(key) {
            continue;
        }
        if keys.is_empty() {
            tx.delete(&bucket, index_key.as_bytes())?;
        } else {
            tx.put(&bucket, index_key.as_bytes(), &codec.encode(&keys)?)?;
        }
        trace!(index = %bucket, "Removed key from index");
    }
    Ok(())
}

/// Move `key` from the index entries of `old` to those of `new`
pub fn update_indexes<R, T>(
    tx: &mut T,
    codec: &Codec,
    key: &[u8],
    old: Option<&R>,
    new: &R,
) -> Result<(), IndexError>
where
    R: Record,
    T: WriteTx + ?Sized,
{
    if let Some(old) = old {
        remove_from_all_indexes(tx, codec, key, old)?;
    }
    add_to_indexes(tx, codec, key, new)
}

fn index_key_for<R: Record>(record: &R, field: &str) -> Result<IndexKey, IndexError> {
    let value = record.field(field).ok_or_else(|| IndexError::MissingField {
        field: field.to_string(),
        record: R::bucket().to_string(),
    })?;
    IndexKey::encode(&value)
}

fn load_keys<T: WriteTx + ?Sized>(
    tx: &T,
    codec: &Codec,
    bucket: &str,
    index_key: &IndexKey,
) -> Result<KeyList, IndexError> {
    match tx.get(bucket, index_key.as_bytes())? {
        Some(raw) => Ok(codec.decode(&raw)?),
        None => Ok(KeyList::new()),
    }
}

/// Index errors
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Indexed field '{field}' does not exist in the type '{record}'")]
    MissingField { field: String, record: String },

    #[error("Unsupported value type for indexing: {0}")]
    Unindexable(String),

    #[error("Index codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Index store error: {0}")]
    Store(#[from] StoreError),
}
