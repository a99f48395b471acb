//! Application state shared by all handlers.

use cutroom_cache::ContentStore;
use cutroom_core::Config;
use cutroom_processing::{MediaProber, MediaToolStatus};
use std::sync::Arc;

use crate::services::SessionRegistry;

pub struct AppState {
    pub config: Config,
    pub store: Arc<ContentStore>,
    /// Probes originals for the upload response and the edit record.
    pub prober: Arc<dyn MediaProber>,
    pub sessions: SessionRegistry,
    /// Result of the startup check; reported by `/health`.
    pub media_tools: MediaToolStatus,
}
