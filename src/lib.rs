//! Liveness probes for cloud storage primitives.
//!
//! Each probe performs one minimal create-or-read operation against a
//! document collection, a blob container, a queue or a table, and reports
//! the result as an HTTP response:
//!
//! ```text
//! GET /api/v1/storage/queue/create  ->  200 {"message":"OK (messageId=...)"}
//! GET /api/v1/storage/queue/get     ->  200 {"message":"OK (count=1)"}
//! GET /api/v1/storage/blob/get/nope ->  500 {"title":"Internal server error",...}
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`probe`]: Probe model, descriptor registry and executor
//! - [`storage`]: Storage capability traits and backends
//! - [`api`]: HTTP routes for probes, health and metrics
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
pub use probe::{ProbeExecutor, ProbeName, ProbeOutcome};
pub use storage::StorageHandles;
