//! Type-aware three-way comparison
//!
//! Every relational operator funnels through [`compare`]. Both operands must
//! fall into the same comparison family:
//! - numbers of any width and signedness
//! - strings (byte-wise)
//! - booleans (false < true)
//! - byte sequences
//! - time instants
//! - user types implementing [`Comparable`](crate::value::Comparable)

use crate::query::QueryError;
use crate::value::{Number, Value};
use std::cmp::Ordering;

/// Compare two values, failing when they belong to different families
pub fn compare(a: &Value, b: &Value) -> Result<Ordering, QueryError> {
    if let Value::Custom(c) = a {
        return c.compare(b);
    }
    if let Value::Custom(c) = b {
        return c.compare(a).map(Ordering::reverse);
    }

    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return Ok(compare_numbers(x, y));
    }

    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.as_bytes().cmp(y.as_bytes())),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Ok(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Ok(x.cmp(y)),
        _ => Err(QueryError::UncomparableTypes {
            left: a.type_name().to_string(),
            right: b.type_name().to_string(),
        }),
    }
}

/// Integers compare exactly, floats by IEEE total order. An integer meets a
/// float through its `f64` image, ties broken by the exact integer value.
pub(crate) fn compare_numbers(a: Number, b: Number) -> Ordering {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.cmp(&y),
        (Number::Float(x), Number::Float(y)) => x.total_cmp(&y),
        (Number::Int(x), Number::Float(y)) => compare_int_float(x, y),
        (Number::Float(x), Number::Int(y)) => compare_int_float(y, x).reverse(),
    }
}

fn compare_int_float(i: i128, f: f64) -> Ordering {
    // equal images imply `f` is finite and integral
    (i as f64).total_cmp(&f).then_with(|| i.cmp(&(f as i128)))
}
