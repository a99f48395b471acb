pub mod service;

pub use service::{CleanupConfig, CleanupReport, CleanupService};
