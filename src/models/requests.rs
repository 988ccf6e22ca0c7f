//! Request DTOs for the cache HTTP API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::Ttl;
use crate::error::Result;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL, whole seconds or an ISO-8601 duration such as `"PT4H"`
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL, backend default when absent or null
    #[serde(default)]
    pub ttl: Option<Value>,
}

impl SetRequest {
    /// Converts the raw `ttl` field, rejecting anything that is not a TTL.
    pub fn ttl(&self) -> Result<Option<Ttl>> {
        self.ttl.as_ref().map(Ttl::try_from).transpose()
    }
}
