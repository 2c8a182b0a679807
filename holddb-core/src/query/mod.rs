//! Query engine for HoldDB
//!
//! This module provides the fluent criteria builder, per-criterion matching,
//! the index-aware key scan and the select/delete traversals.

pub mod builder;
pub mod criterion;
pub mod executor;
pub mod scan;

pub use builder::{key, where_, CriterionBuilder, Query, KEY};
pub use criterion::{BoxError, Criterion, MatchFn, Operator};
pub use executor::QueryExecutor;
pub use scan::{IndexPolicy, KeyScan, RangePolicy, DEFAULT_SCAN_BATCH_SIZE};

use crate::codec::CodecError;
use crate::index::IndexError;
use crate::store::StoreError;

/// Query errors
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid field name '{0}': the first letter of a queried field must be upper-case")]
    InvalidFieldName(String),

    #[error("The field '{field}' does not exist in the type '{record}'")]
    FieldNotFound { field: String, record: String },

    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),

    #[error("Cannot compare a value of type {left} with a value of type {right}")]
    UncomparableTypes { left: String, right: String },

    #[error(transparent)]
    Predicate(BoxError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}
