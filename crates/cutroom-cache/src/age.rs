//! File age checks shared by the store and the upload sweep.

use std::time::{Duration, SystemTime};

/// True when the last modification is more than `max_age` ago.
///
/// A missing or future mtime never counts as old.
pub fn is_older_than(metadata: &std::fs::Metadata, max_age: Duration) -> bool {
    metadata
        .modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age > max_age)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fresh_file_is_not_old() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();
        let metadata = std::fs::metadata(&path).unwrap();
        assert!(!is_older_than(&metadata, Duration::from_secs(3600)));
    }

    #[test]
    fn test_file_past_max_age_is_old() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let metadata = std::fs::metadata(&path).unwrap();
        assert!(is_older_than(&metadata, Duration::from_millis(5)));
    }
}
