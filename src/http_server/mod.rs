//! # HTTP Server Module
//!
//! Axum front end for the stream driver.
//!
//! # Endpoints
//!
//! - `POST /stream` - Run a query, stream rows as NDJSON or Arrow IPC
//! - `/health` - Health check
//! - `/observability/*` - Health and stream counters

pub mod config;
pub mod errors;
pub mod observability_routes;
pub mod server;
pub mod stream_routes;

pub use config::{HttpServerConfig, StreamSettings, DEFAULT_MAX_BATCH_SIZE};
pub use errors::{ApiError, ApiResult, ErrorResponse};
pub use server::HttpServer;
pub use stream_routes::{StreamRequest, StreamState, STREAM_ID_HEADER};
