//! API Handlers
//!
//! HTTP request handlers for each cache endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::Cache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HasResponse, HealthResponse, SetRequest,
    SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The facade takes `&self` everywhere, so no lock is needed around it.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<Cache>,
}

impl AppState {
    /// Creates a new AppState around the given cache.
    pub fn new(cache: Cache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Fails when the configured backend is unavailable.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(Cache::new(config)?))
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    let ttl = req.ttl()?;

    if !state.cache.set(&req.key, &req.value, ttl)? {
        return Err(CacheError::WriteFailed(format!("set {}", req.key)));
    }

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value by key; a miss is a 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.fetch(&key)? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for GET /has/:key
pub async fn has_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<HasResponse>> {
    let exists = state.cache.has(&key)?;
    Ok(Json(HasResponse { key, exists }))
}

/// Handler for DELETE /del/:key
///
/// Deleting an absent key succeeds on backends that treat it as such and is
/// a 404 on backends that report it as not deleted.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.cache.delete(&key)? {
        if !state.cache.has(&key)? {
            return Err(CacheError::NotFound(key));
        }
        return Err(CacheError::WriteFailed(format!("delete {}", key)));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    if !state.cache.clear() {
        return Err(CacheError::WriteFailed("clear".to_string()));
    }

    Ok(Json(ClearResponse::cleared()))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats();
    Json(StatsResponse::new(state.cache.storage().name(), &stats))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
