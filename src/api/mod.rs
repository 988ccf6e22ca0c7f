//! API Module
//!
//! HTTP handlers and routing exposing the cache facade.
//!
//! # Endpoints
//! - `PUT /set` - Store a key-value pair
//! - `GET /get/:key` - Retrieve a value by key
//! - `GET /has/:key` - Advisory existence check
//! - `DELETE /del/:key` - Delete a key
//! - `DELETE /clear` - Clear the backend
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
