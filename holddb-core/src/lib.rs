//! HoldDB Core - Typed queries over an ordered key-value store
//!
//! This crate provides:
//! - A fluent criteria builder with AND/OR combination
//! - Type-aware value comparison and per-field matching
//! - Index-narrowed or full key scans
//! - Select and delete traversals with cross-branch deduplication
//! - An in-memory store, codecs and secondary index maintenance

pub mod codec;
pub mod compare;
pub mod config;
pub mod hold;
pub mod index;
pub mod keys;
pub mod logging;
pub mod query;
pub mod record;
pub mod store;
pub mod value;

pub use codec::{Codec, CodecError};
pub use compare::compare;
pub use config::{HoldConfig, LogFormat, LogLevel, LoggingSettings, StoreSettings};
pub use hold::{Hold, HoldError};
pub use index::{IndexError, IndexKey};
pub use keys::KeyList;
pub use logging::{init_logging, SlowQueryLogger};
pub use query::{
    key, where_, Criterion, CriterionBuilder, IndexPolicy, KeyScan, MatchFn, Operator, Query,
    QueryError, QueryExecutor, RangePolicy, KEY,
};
pub use record::Record;
pub use store::{KeyRange, MemoryStore, ReadTx, StoreError, WriteTx};
pub use value::{Comparable, Value};
