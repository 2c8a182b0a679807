//! Fluent query builder
//!
//! ```ignore
//! let query = where_("Name")?.eq("Tim").and("Age")?.ge(35u32);
//! let either = where_("Age")?.lt(35u32).or(where_("Name")?.eq("Ann"));
//! ```
//!
//! A query is an AND-group of per-field criteria plus any number of OR-branches.
//! Once built it is immutable and only borrowed by the executor.

use super::criterion::{matches_all, matches_all_key, BoxError, Criterion, MatchFn, Operator};
use super::QueryError;
use crate::codec::Codec;
use crate::record::Record;
use crate::value::Value;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Field name that addresses the primary key instead of a record field
pub const KEY: &str = "";

/// The primary key sentinel, for use with [`where_`] and [`Query::and`]
pub fn key() -> &'static str {
    KEY
}

/// Start a new query on `field`, nominating it as the query's index
pub fn where_(field: &str) -> Result<CriterionBuilder, QueryError> {
    validate_field(field)?;

    let mut query = Query::new();
    if field != KEY {
        query.index = Some(field.to_string());
    }
    query.active_field = field.to_string();

    Ok(CriterionBuilder { query })
}

/// Query over the records of one type
#[derive(Debug, Clone, Default)]
pub struct Query {
    index: Option<String>,
    active_field: String,
    criteria: BTreeMap<String, Vec<Criterion>>,
    ors: Vec<Query>,
}

impl Query {
    /// Create the empty query, which matches every record
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion on `field`, ANDed with everything already in the query
    pub fn and(mut self, field: &str) -> Result<CriterionBuilder, QueryError> {
        validate_field(field)?;
        self.active_field = field.to_string();
        Ok(CriterionBuilder { query: self })
    }

    /// Union the results of `other`, skipping records already matched
    pub fn or(mut self, other: Query) -> Query {
        self.ors.push(other);
        self
    }

    /// Nominate `field` as the index to scan
    pub fn index(mut self, field: &str) -> Result<Query, QueryError> {
        validate_field(field)?;
        self.index = if field == KEY {
            None
        } else {
            Some(field.to_string())
        };
        Ok(self)
    }

    /// Check if the query has no index, no criteria and no OR-branches
    pub fn is_empty(&self) -> bool {
        self.index.is_none() && self.criteria.is_empty() && self.ors.is_empty()
    }

    /// Nominated index field
    pub fn index_field(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// Criteria ANDed on `field`
    pub fn criteria(&self, field: &str) -> &[Criterion] {
        self.criteria.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fields carrying criteria, in name order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.criteria.keys().map(String::as_str)
    }

    /// OR-branches in declaration order
    pub fn or_branches(&self) -> &[Query] {
        &self.ors
    }

    /// Check a decoded record and its primary key against every criterion.
    ///
    /// When `index_usable` is set the index field was already narrowed by the
    /// scan and its criteria are not evaluated again.
    pub fn matches_all_fields<R: Record>(
        &self,
        key: &[u8],
        record: &R,
        codec: &Codec,
        index_usable: bool,
    ) -> Result<bool, QueryError> {
        if self.is_empty() {
            return Ok(true);
        }

        for (field, criteria) in &self.criteria {
            if field == KEY {
                if !matches_all_key(criteria, key, codec)? {
                    return Ok(false);
                }
                continue;
            }

            if index_usable && self.index.as_deref() == Some(field.as_str()) {
                continue;
            }

            let value = record.field(field).ok_or_else(|| QueryError::FieldNotFound {
                field: field.clone(),
                record: R::bucket().to_string(),
            })?;
            if !matches_all(criteria, &value)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn push(mut self, op: Operator) -> Query {
        self.criteria
            .entry(self.active_field.clone())
            .or_default()
            .push(Criterion::new(op));
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = &self.index {
            write!(f, "Using Index [{}] ", index)?;
        }

        let mut first = true;
        for (field, criteria) in &self.criteria {
            let name = if field == KEY { "Key" } else { field.as_str() };
            for criterion in criteria {
                f.write_str(if first { "Where " } else { "\n\tAND " })?;
                first = false;
                write!(f, "{} {}", name, criterion)?;
            }
        }

        for branch in &self.ors {
            write!(f, "\nOr {}", branch)?;
        }
        Ok(())
    }
}

/// Binds the next operator to the active field of a query
#[derive(Debug)]
pub struct CriterionBuilder {
    query: Query,
}

impl CriterionBuilder {
    /// Field equals `value`
    pub fn eq(self, value: impl Into<Value>) -> Query {
        self.query.push(Operator::Eq(value.into()))
    }

    /// Field differs from `value`
    pub fn ne(self, value: impl Into<Value>) -> Query {
        self.query.push(Operator::Ne(value.into()))
    }

    /// Field is greater than `value`
    pub fn gt(self, value: impl Into<Value>) -> Query {
        self.query.push(Operator::Gt(value.into()))
    }

    /// Field is less than `value`
    pub fn lt(self, value: impl Into<Value>) -> Query {
        self.query.push(Operator::Lt(value.into()))
    }

    /// Field is greater than or equal to `value`
    pub fn ge(self, value: impl Into<Value>) -> Query {
        self.query.push(Operator::Ge(value.into()))
    }

    /// Field is less than or equal to `value`
    pub fn le(self, value: impl Into<Value>) -> Query {
        self.query.push(Operator::Le(value.into()))
    }

    /// Field equals one of `values`; an empty list matches nothing
    pub fn in_<I, V>(self, values: I) -> Query
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.query.push(Operator::In(values))
    }

    /// Rendered field matches `pattern`
    pub fn matches(self, pattern: Regex) -> Query {
        self.query.push(Operator::Matches(pattern))
    }

    /// `predicate` accepts the field
    pub fn predicate<F>(self, predicate: F) -> Query
    where
        F: Fn(&Value) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        let f: MatchFn = Arc::new(predicate);
        self.query.push(Operator::Predicate(f))
    }
}

/// Field names start with an upper-case letter; the empty name is the key
fn validate_field(field: &str) -> Result<(), QueryError> {
    match field.chars().next() {
        None => Ok(()),
        Some(c) if c.is_uppercase() => Ok(()),
        Some(_) => Err(QueryError::InvalidFieldName(field.to_string())),
    }
}
