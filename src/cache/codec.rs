//! Serialization Codec
//!
//! Byte encoding used by the file backend. Decoding reports failure through
//! `Err`, so a stored `false` or `null` is never mistaken for a corrupt entry.

use serde_json::Value;
use thiserror::Error;

/// Encoding or decoding failure.
#[derive(Error, Debug)]
#[error("cache codec failure: {0}")]
pub struct CodecError(#[from] serde_json::Error);

/// Encodes a value into its on-disk representation.
pub fn encode(value: &Value) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes bytes produced by [`encode`].
///
/// Truncated, malformed or trailing-garbage input is an error.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}
