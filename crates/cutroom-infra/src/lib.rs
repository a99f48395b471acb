//! Cutroom Infrastructure Library
//!
//! Shared infrastructure for the upload server:
//! - Telemetry initialization
//! - Request ID middleware
//! - Background cleanup of stale uploads and proxies

pub mod cleanup;
pub mod middleware;
pub mod telemetry;

// Re-export commonly used types
pub use cleanup::{CleanupConfig, CleanupReport, CleanupService};
pub use middleware::{request_id_middleware, RequestId};
pub use telemetry::{init_telemetry, shutdown_telemetry};
