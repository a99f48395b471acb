//! Least-recently-used victim selection over the whole index.
//!
//! There are no per-session reservations: one busy session can push every
//! other session's proxies out of the cache.

use cutroom_core::CacheEntry;
use std::cmp::Ordering;

use crate::index::CacheIndex;

fn lru_order(a: &CacheEntry, b: &CacheEntry) -> Ordering {
    a.last_accessed_at
        .cmp(&b.last_accessed_at)
        .then(a.created_at.cmp(&b.created_at))
        .then(a.cache_key.cmp(&b.cache_key))
}

/// Keys to delete, oldest access first, until the recorded sizes fit in
/// `budget_bytes`.
///
/// Entries for which `is_pinned` returns true are never selected. The result
/// may leave the index over budget when only pinned entries remain.
pub fn select_victims<F>(index: &CacheIndex, budget_bytes: u64, is_pinned: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut total = index.total_bytes();
    if total <= budget_bytes {
        return Vec::new();
    }

    let mut candidates: Vec<&CacheEntry> = index
        .iter()
        .filter(|e| !is_pinned(&e.cache_key))
        .collect();
    candidates.sort_by(|a, b| lru_order(a, b));

    let mut victims = Vec::new();
    for entry in candidates {
        if total <= budget_bytes {
            break;
        }
        total = total.saturating_sub(entry.size_bytes);
        victims.push(entry.cache_key.clone());
    }
    victims
}
