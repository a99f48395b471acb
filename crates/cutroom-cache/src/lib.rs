//! Cutroom Cache Library
//!
//! Content-addressed store for derived proxies: hashing, the persisted index,
//! LRU eviction under a byte budget and leases that keep in-use artifacts alive.

pub mod age;
pub mod error;
pub mod eviction;
pub mod index;
pub mod key;
pub mod lease;
pub mod store;

pub use age::is_older_than;
pub use error::CacheError;
pub use index::{CacheIndex, INDEX_FILE_NAME};
pub use key::{cache_key, hash_file};
pub use lease::{Lease, LeaseTracker, SweepReservation};
pub use store::{CacheLookup, ContentStore, ContentStoreConfig};
