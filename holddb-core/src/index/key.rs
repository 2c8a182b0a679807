//! Order-preserving index key encoding
//!
//! Byte order of an encoded key equals [`compare`](crate::compare::compare)
//! order of the values it was built from, within one comparison family. Each
//! family starts with its own tag byte, so a family occupies one contiguous
//! byte range of the index bucket.

use super::IndexError;
use crate::value::{Number, Value};
use serde::{Deserialize, Serialize};

const TAG_BOOL: u8 = 0x10;
const TAG_NUMBER: u8 = 0x20;
const TAG_STRING: u8 = 0x30;
const TAG_BYTES: u8 = 0x40;
const TAG_TIME: u8 = 0x50;

/// Encoded index value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexKey(Vec<u8>);

impl IndexKey {
    /// Encode a value
    pub fn encode(value: &Value) -> Result<Self, IndexError> {
        let tag = family_tag(value)?;
        let mut out = vec![tag];

        match value {
            Value::Bool(b) => out.push(u8::from(*b)),
            Value::String(s) => push_escaped(&mut out, s.as_bytes()),
            Value::Bytes(b) => push_escaped(&mut out, b),
            Value::Time(t) => {
                out.extend_from_slice(&ordered_i64(t.timestamp()).to_be_bytes());
                out.extend_from_slice(&t.timestamp_subsec_nanos().to_be_bytes());
            }
            _ => {
                if let Some(number) = value.as_number() {
                    push_number(&mut out, number);
                }
            }
        }

        Ok(Self(out))
    }

    /// Smallest key of the value's family
    pub fn family_start(value: &Value) -> Result<Vec<u8>, IndexError> {
        Ok(vec![family_tag(value)?])
    }

    /// Exclusive upper bound of the value's family
    pub fn family_end(value: &Value) -> Result<Vec<u8>, IndexError> {
        Ok(vec![family_tag(value)? + 1])
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Take the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

fn family_tag(value: &Value) -> Result<u8, IndexError> {
    match value {
        Value::Bool(_) => Ok(TAG_BOOL),
        Value::String(_) => Ok(TAG_STRING),
        Value::Bytes(_) => Ok(TAG_BYTES),
        Value::Time(_) => Ok(TAG_TIME),
        Value::Custom(c) => Err(IndexError::Unindexable(c.to_string())),
        _ => Ok(TAG_NUMBER),
    }
}

/// 0x00 becomes 0x00 0xFF and the value ends with 0x00 0x00, so a prefix
/// always sorts before its extensions.
fn push_escaped(out: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        out.push(b);
        if b == 0 {
            out.push(0xFF);
        }
    }
    out.extend_from_slice(&[0x00, 0x00]);
}

/// The `f64` image orders first, the exact integer breaks ties between values
/// sharing an image.
fn push_number(out: &mut Vec<u8>, number: Number) {
    let (image, exact) = match number {
        Number::Int(i) => (i as f64, i),
        Number::Float(f) => (f, f as i128),
    };
    out.extend_from_slice(&ordered_f64(image).to_be_bytes());
    out.extend_from_slice(&ordered_i128(exact).to_be_bytes());
}

fn ordered_f64(f: f64) -> u64 {
    let bits = f.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

fn ordered_i64(i: i64) -> u64 {
    (i as u64) ^ (1 << 63)
}

fn ordered_i128(i: i128) -> u128 {
    (i as u128) ^ (1 << 127)
}
