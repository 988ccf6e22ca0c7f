//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache and its HTTP front.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty or contains a reserved character
    #[error("{}", describe_invalid_key(.key, .character))]
    InvalidKey {
        key: String,
        character: Option<char>,
    },

    /// TTL is neither absent, a non-negative integer nor a duration interval
    #[error("Invalid cache TTL value expected null|int|interval but got [{0}]")]
    InvalidTtl(String),

    /// Storage medium missing or unusable at construction time
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Malformed configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Backend reported a failed write, delete or clear
    #[error("Write failed: {0}")]
    WriteFailed(String),
}

fn describe_invalid_key(key: &str, character: &Option<char>) -> String {
    match character {
        Some(c) => format!("Invalid character [{}] in cache key [{}]", c, key),
        None => "Invalid cache key, can not be empty".to_string(),
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey { .. } | CacheError::InvalidTtl(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Config(_) | CacheError::WriteFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
