//! Criteria and per-criterion matching
//!
//! A criterion is one operator with its operand. It tests either a live field
//! value or an encoded primary key.

use super::QueryError;
use crate::codec::Codec;
use crate::compare::compare;
use crate::value::Value;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Error type returned by user predicates
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// User predicate over a field value
pub type MatchFn = Arc<dyn Fn(&Value) -> Result<bool, BoxError> + Send + Sync>;

/// Operator with its operand
#[derive(Clone)]
pub enum Operator {
    /// field == value
    Eq(Value),
    /// field != value
    Ne(Value),
    /// field > value
    Gt(Value),
    /// field < value
    Lt(Value),
    /// field >= value
    Ge(Value),
    /// field <= value
    Le(Value),
    /// field equals one of the values
    In(Vec<Value>),
    /// rendered field matches the pattern; bytes are matched as text
    Matches(Regex),
    /// user predicate accepts the field
    Predicate(MatchFn),
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Eq(v) => f.debug_tuple("Eq").field(v).finish(),
            Operator::Ne(v) => f.debug_tuple("Ne").field(v).finish(),
            Operator::Gt(v) => f.debug_tuple("Gt").field(v).finish(),
            Operator::Lt(v) => f.debug_tuple("Lt").field(v).finish(),
            Operator::Ge(v) => f.debug_tuple("Ge").field(v).finish(),
            Operator::Le(v) => f.debug_tuple("Le").field(v).finish(),
            Operator::In(vs) => f.debug_tuple("In").field(vs).finish(),
            Operator::Matches(re) => f.debug_tuple("Matches").field(&re.as_str()).finish(),
            Operator::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// One operator and operand bound to a field of a query
#[derive(Debug, Clone)]
pub struct Criterion {
    op: Operator,
}

impl Criterion {
    /// Create a criterion
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    /// The operator and its operand
    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Test a live field value
    pub fn test(&self, value: &Value) -> Result<bool, QueryError> {
        let (operand, accept): (&Value, fn(Ordering) -> bool) = match &self.op {
            Operator::In(values) => {
                for v in values {
                    if compare(value, v)? == Ordering::Equal {
                        return Ok(true);
                    }
                }
                return Ok(false);
            }
            Operator::Matches(re) => {
                let text = match value {
                    Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                    other => other.to_string(),
                };
                return Ok(re.is_match(&text));
            }
            Operator::Predicate(f) => return f(value).map_err(QueryError::Predicate),
            Operator::Eq(v) => (v, Ordering::is_eq),
            Operator::Ne(v) => (v, Ordering::is_ne),
            Operator::Gt(v) => (v, Ordering::is_gt),
            Operator::Lt(v) => (v, Ordering::is_lt),
            Operator::Ge(v) => (v, Ordering::is_ge),
            Operator::Le(v) => (v, Ordering::is_le),
        };

        Ok(accept(compare(value, operand)?))
    }

    /// Test an encoded primary key.
    ///
    /// The key is decoded into the operand's type. `Matches` decodes it as a
    /// string and `Predicate` receives the raw key bytes.
    pub fn test_key(&self, key: &[u8], codec: &Codec) -> Result<bool, QueryError> {
        let value = match &self.op {
            Operator::Eq(v)
            | Operator::Ne(v)
            | Operator::Gt(v)
            | Operator::Lt(v)
            | Operator::Ge(v)
            | Operator::Le(v) => v.decode_like(codec, key)?,
            Operator::In(values) => match values.first() {
                Some(v) => v.decode_like(codec, key)?,
                None => return Ok(false),
            },
            Operator::Matches(_) => Value::String(codec.decode(key)?),
            Operator::Predicate(_) => Value::Bytes(key.to_vec()),
        };
        self.test(&value)
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op {
            Operator::Eq(v) => write!(f, "== {}", v),
            Operator::Ne(v) => write!(f, "!= {}", v),
            Operator::Gt(v) => write!(f, "> {}", v),
            Operator::Lt(v) => write!(f, "< {}", v),
            Operator::Ge(v) => write!(f, ">= {}", v),
            Operator::Le(v) => write!(f, "<= {}", v),
            Operator::In(values) => {
                f.write_str("in [")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
            Operator::Matches(re) => write!(f, "matches the regular expression {}", re),
            Operator::Predicate(_) => f.write_str("matches the function"),
        }
    }
}

/// Every criterion must accept `value`; the first rejection short-circuits
pub(crate) fn matches_all(criteria: &[Criterion], value: &Value) -> Result<bool, QueryError> {
    for criterion in criteria {
        if !criterion.test(value)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Same as [`matches_all`] against an encoded primary key
pub(crate) fn matches_all_key(
    criteria: &[Criterion],
    key: &[u8],
    codec: &Codec,
) -> Result<bool, QueryError> {
    for criterion in criteria {
        if !criterion.test_key(key, codec)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crit(op: Operator) -> Criterion {
        Criterion::new(op)
    }

    #[test]
    fn test_relational_operators() {
        let age = Value::from(30u32);
        assert!(crit(Operator::Eq(30i64.into())).test(&age).unwrap());
        assert!(!crit(Operator::Ne(30i64.into())).test(&age).unwrap());
        assert!(crit(Operator::Gt(29u8.into())).test(&age).unwrap());
        assert!(crit(Operator::Lt(30.5f64.into())).test(&age).unwrap());
        assert!(crit(Operator::Ge(30u32.into())).test(&age).unwrap());
        assert!(crit(Operator::Le(30u32.into())).test(&age).unwrap());
        assert!(!crit(Operator::Le(29u32.into())).test(&age).unwrap());
    }

    #[test]
    fn test_relational_type_mismatch_fails() {
        let err = crit(Operator::Eq("30".into())).test(&Value::from(30u32)).unwrap_err();
        assert!(matches!(err, QueryError::UncomparableTypes { .. }));
    }

    #[test]
    fn test_in_operator() {
        let c = crit(Operator::In(vec!["Ann".into(), "Tim".into()]));
        assert!(c.test(&Value::from("Tim")).unwrap());
        assert!(!c.test(&Value::from("Bob")).unwrap());
        assert!(!crit(Operator::In(vec![])).test(&Value::from("Tim")).unwrap());
    }

    #[test]
    fn test_matches_renders_any_value() {
        let c = crit(Operator::Matches(Regex::new(r"^3\d$").unwrap()));
        assert!(c.test(&Value::from(35u8)).unwrap());
        assert!(!c.test(&Value::from(135u8)).unwrap());
        assert!(!c.test(&Value::from("Tim")).unwrap());
    }

    #[test]
    fn test_matches_reads_bytes_as_text() {
        let c = crit(Operator::Matches(Regex::new("^abc").unwrap()));
        assert!(c.test(&Value::from(b"abcdef".to_vec())).unwrap());
        assert!(!c.test(&Value::from(b"xabc".to_vec())).unwrap());
        assert_eq!(Value::from(b"abc".to_vec()).to_string(), "[97 98 99]");
    }

    #[test]
    fn test_predicate_error_propagates_verbatim() {
        let f: MatchFn = Arc::new(|v: &Value| -> Result<bool, BoxError> {
            if v.as_str() == Some("boom") {
                Err("predicate exploded".into())
            } else {
                Ok(v.as_str().map(|s| s.len() > 2).unwrap_or(false))
            }
        });
        let c = crit(Operator::Predicate(f));

        assert!(c.test(&Value::from("Tim")).unwrap());
        assert!(!c.test(&Value::from("Al")).unwrap());
        let err = c.test(&Value::from("boom")).unwrap_err();
        assert!(matches!(err, QueryError::Predicate(_)));
        assert_eq!(err.to_string(), "predicate exploded");
    }

    #[test]
    fn test_key_decoding_uses_operand_type() {
        let codec = Codec::Bincode;
        let key = codec.encode(&7u64).unwrap();

        assert!(crit(Operator::Eq(7u64.into())).test_key(&key, &codec).unwrap());
        assert!(crit(Operator::In(vec![1u64.into(), 7u64.into()]))
            .test_key(&key, &codec)
            .unwrap());
        assert!(!crit(Operator::In(vec![])).test_key(&key, &codec).unwrap());

        let err = crit(Operator::Eq("7".into())).test_key(&key, &codec).unwrap_err();
        assert!(matches!(err, QueryError::Decode(_)));
    }

    #[test]
    fn test_key_of_another_type_fails_to_decode() {
        let codec = Codec::Bincode;

        let text_key = codec.encode("abc").unwrap();
        let err = crit(Operator::Eq(3u64.into())).test_key(&text_key, &codec).unwrap_err();
        assert!(matches!(err, QueryError::Decode(_)));

        let wide_key = codec.encode(&((1u64 << 32) + 7)).unwrap();
        let err = crit(Operator::Eq(7u32.into())).test_key(&wide_key, &codec).unwrap_err();
        assert!(matches!(err, QueryError::Decode(_)));
        let err = crit(Operator::In(vec![7u32.into()]))
            .test_key(&wide_key, &codec)
            .unwrap_err();
        assert!(matches!(err, QueryError::Decode(_)));
    }

    #[test]
    fn test_key_matches_and_predicate() {
        let codec = Codec::Json;
        let key = codec.encode("user-42").unwrap();

        let re = crit(Operator::Matches(Regex::new(r"^user-\d+$").unwrap()));
        assert!(re.test_key(&key, &codec).unwrap());

        let raw: MatchFn = Arc::new(|v: &Value| -> Result<bool, BoxError> {
            Ok(matches!(v, Value::Bytes(b) if b.starts_with(b"\"")))
        });
        assert!(crit(Operator::Predicate(raw)).test_key(&key, &codec).unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(crit(Operator::Eq("Tim".into())).to_string(), "== Tim");
        assert_eq!(crit(Operator::Ge(35u8.into())).to_string(), ">= 35");
        assert_eq!(
            crit(Operator::In(vec![1u8.into(), 2u8.into()])).to_string(),
            "in [1 2]"
        );
        assert_eq!(
            crit(Operator::Matches(Regex::new("^T").unwrap())).to_string(),
            "matches the regular expression ^T"
        );
    }
}
