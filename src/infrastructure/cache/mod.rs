//! Media cache housekeeping

use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};

/// Expires cached image/record files by modification time
pub struct CacheManager {
    dirs: Vec<PathBuf>,
}

impl CacheManager {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Remove cached files older than `expiry_secs`. Returns how many were removed.
    pub fn check_cache_limit(&self, expiry_secs: u64) -> usize {
        let cutoff = Utc::now() - Duration::seconds(expiry_secs.min(u32::MAX as u64) as i64);
        let mut removed = 0;
        for dir in &self.dirs {
            removed += sweep(dir, |modified| modified < cutoff);
        }
        if removed > 0 {
            tracing::info!("Cache sweep removed {} expired files", removed);
        }
        removed
    }

    /// Remove every cached file
    pub fn clear(&self) -> usize {
        let removed = self.dirs.iter().map(|dir| sweep(dir, |_| true)).sum();
        tracing::debug!("Cache cleared ({} files)", removed);
        removed
    }
}

fn sweep(dir: &Path, expired: impl Fn(DateTime<Utc>) -> bool) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Skipping cache directory {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let modified = match meta.modified() {
            Ok(t) => DateTime::<Utc>::from(t),
            Err(_) => continue,
        };
        if expired(modified) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove cached file {}: {}", path.display(), e),
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_files_survive_sweep() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"img").unwrap();
        let cache = CacheManager::new(vec![dir.path().to_path_buf()]);
        assert_eq!(cache.check_cache_limit(3600), 0);
        assert!(dir.path().join("a.png").exists());
    }

    #[test]
    fn test_zero_expiry_removes_everything_older_than_now() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"img").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let cache = CacheManager::new(vec![dir.path().to_path_buf()]);
        assert_eq!(cache.check_cache_limit(0), 1);
    }

    #[test]
    fn test_clear_keeps_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.amr"), b"rec").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let cache = CacheManager::new(vec![dir.path().to_path_buf(), PathBuf::from("/nonexistent")]);
        assert_eq!(cache.clear(), 1);
        assert!(dir.path().join("nested").is_dir());
    }
}
