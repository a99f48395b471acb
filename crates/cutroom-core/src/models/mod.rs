pub mod cache;
pub mod media;
pub mod proxy;
pub mod session;

pub use cache::{CacheEntry, CacheStats};
pub use media::MediaInfo;
pub use proxy::{ProxyArtifact, QualityTier};
pub use session::{EditSession, InvalidSessionScope, SessionScope};
