//! Cutroom Core Library
//!
//! Domain models, the unified error type and configuration shared by the
//! proxy derivation, cache and HTTP crates.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{BaseConfig, Config, ProxyCacheConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    CacheEntry, CacheStats, EditSession, InvalidSessionScope, MediaInfo, ProxyArtifact,
    QualityTier, SessionScope,
};
