pub mod cache_stats;
pub mod edits;
pub mod export_download;
pub mod health;
pub mod proxy_stream;
pub mod sessions;
pub mod upload;
