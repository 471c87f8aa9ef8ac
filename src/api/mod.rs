//! API Module
//!
//! HTTP front end over one [`Cache`](crate::cache::Cache) facade.
//!
//! # Endpoints
//! - `PUT /set` - Store a value, optionally with a TTL and tags
//! - `GET /get/:key` - Retrieve a value
//! - `DELETE /del/:key` - Delete a key
//! - `GET /ttl/:key` - Remaining lifetime of a key
//! - `GET /tags/:tag` - Keys in a tag group
//! - `DELETE /tags/:tag` - Delete a tag group
//! - `POST /flush` - Remove every item
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
