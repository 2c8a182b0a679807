//! Record, key and index-list serialization
//!
//! The codec is selected by configuration; bincode is the default and JSON is
//! available for stores that need human-readable values.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Fixed-width little-endian bincode that refuses to leave input unread
fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Serialization format for stored bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Compact binary encoding
    #[default]
    Bincode,
    /// JSON encoding
    Json,
}

impl Codec {
    /// Serialize a value to bytes
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::Bincode => {
                bincode_options()
                .serialize(value)
                .map_err(|e| CodecError::Encode(e.to_string()))
            }
            Codec::Json => serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string())),
        }
    }

    /// Deserialize a value from bytes
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Codec::Bincode => {
                bincode_options()
                .deserialize(bytes)
                .map_err(|e| CodecError::Decode(e.to_string()))
            }
            Codec::Json => {
                serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
            }
        }
    }
}

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to encode value: {0}")]
    Encode(String),

    #[error("Failed to decode value: {0}")]
    Decode(String),
}
