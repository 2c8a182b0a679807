//! Dynamic values for query operands and record fields
//!
//! This module provides:
//! - Value: every kind of value a criterion can be built from
//! - Comparable: the capability a user type implements to take part in comparisons
//! - Key decoding: turning an encoded primary key back into a typed value
//!
//! Integer and float widths are preserved so that an encoded primary key can be
//! decoded into exactly the type its operand was built from.

use crate::codec::{Codec, CodecError};
use crate::query::QueryError;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A user type that exposes its own three-way comparison
pub trait Comparable: fmt::Debug + fmt::Display + Send + Sync {
    /// Compare `self` against `other`
    fn compare(&self, other: &Value) -> Result<Ordering, QueryError>;

    /// Access to the concrete type, for implementations that downcast `other`
    fn as_any(&self) -> &dyn Any;
}

/// Value used as a criterion operand or read from a record field
#[derive(Debug, Clone)]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// 8-bit signed integer
    I8(i8),
    /// 16-bit signed integer
    I16(i16),
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit signed integer
    I64(i64),
    /// 8-bit unsigned integer
    U8(u8),
    /// 16-bit unsigned integer
    U16(u16),
    /// 32-bit unsigned integer
    U32(u32),
    /// 64-bit unsigned integer
    U64(u64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// UTF-8 string
    String(String),
    /// Raw byte sequence
    Bytes(Vec<u8>),
    /// Instant in UTC
    Time(DateTime<Utc>),
    /// User type with its own comparison
    Custom(Arc<dyn Comparable>),
}

/// Numeric image of a value, normalized for width and signedness
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Int(i128),
    Float(f64),
}

impl Value {
    /// Wrap a user type that implements [`Comparable`]
    pub fn custom(value: impl Comparable + 'static) -> Self {
        Value::Custom(Arc::new(value))
    }

    /// Name of the value's type, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Time(_) => "time",
            Value::Custom(_) => "custom",
        }
    }

    /// Check if value is any integer or float kind
    pub fn is_number(&self) -> bool {
        self.as_number().is_some()
    }

    /// Get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match *self {
            Value::I8(v) => Some(Number::Int(v as i128)),
            Value::I16(v) => Some(Number::Int(v as i128)),
            Value::I32(v) => Some(Number::Int(v as i128)),
            Value::I64(v) => Some(Number::Int(v as i128)),
            Value::U8(v) => Some(Number::Int(v as i128)),
            Value::U16(v) => Some(Number::Int(v as i128)),
            Value::U32(v) => Some(Number::Int(v as i128)),
            Value::U64(v) => Some(Number::Int(v as i128)),
            Value::F32(v) => Some(Number::Float(v as f64)),
            Value::F64(v) => Some(Number::Float(v)),
            _ => None,
        }
    }

    /// Decode an encoded primary key into a value of the same type as `self`
    pub fn decode_like(&self, codec: &Codec, bytes: &[u8]) -> Result<Value, CodecError> {
        let value = match self {
            Value::Bool(_) => Value::Bool(codec.decode(bytes)?),
            Value::I8(_) => Value::I8(codec.decode(bytes)?),
            Value::I16(_) => Value::I16(codec.decode(bytes)?),
            Value::I32(_) => Value::I32(codec.decode(bytes)?),
            Value::I64(_) => Value::I64(codec.decode(bytes)?),
            Value::U8(_) => Value::U8(codec.decode(bytes)?),
            Value::U16(_) => Value::U16(codec.decode(bytes)?),
            Value::U32(_) => Value::U32(codec.decode(bytes)?),
            Value::U64(_) => Value::U64(codec.decode(bytes)?),
            Value::F32(_) => Value::F32(codec.decode(bytes)?),
            Value::F64(_) => Value::F64(codec.decode(bytes)?),
            Value::String(_) => Value::String(codec.decode(bytes)?),
            Value::Bytes(_) => Value::Bytes(codec.decode(bytes)?),
            Value::Time(_) => Value::Time(codec.decode(bytes)?),
            Value::Custom(c) => {
                return Err(CodecError::Decode(format!(
                    "a key cannot be decoded into the custom value {}",
                    c
                )))
            }
        };
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::I8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::Bytes(bytes) => {
                f.write_str("[")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", b)?;
                }
                f.write_str("]")
            }
            Value::Time(t) => write!(f, "{}", t),
            Value::Custom(c) => write!(f, "{}", c),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Vec<u8> => Bytes,
    DateTime<Utc> => Time,
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::U64(v as u64)
    }
}

impl From<isize> for Value {
    fn from(v: isize) -> Self {
        Value::I64(v as i64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Bytes(bytes.to_vec())
    }
}

impl From<Arc<dyn Comparable>> for Value {
    fn from(c: Arc<dyn Comparable>) -> Self {
        Value::Custom(c)
    }
}
