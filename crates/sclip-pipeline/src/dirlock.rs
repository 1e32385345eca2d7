//! Per-destination-directory serialization.
//!
//! At most one job writes into a destination directory at a time; later
//! jobs for the same directory queue FIFO (tokio mutexes wake waiters in
//! acquisition order) instead of being rejected.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

/// Registry of one async mutex per destination directory.
#[derive(Default)]
pub struct DirLocks {
    locks: StdMutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DirLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding a destination directory.
    pub fn for_dir(&self, dir: &Path) -> Arc<Mutex<()>> {
        let key = normalize(dir);
        self.locks
            .lock()
            .expect("dir lock registry poisoned")
            .entry(key)
            .or_default()
            .clone()
    }
}

/// Resolve symlinks and relative components so two spellings of the same
/// directory share one lock. Falls back to the literal path when the
/// directory cannot be canonicalized yet.
fn normalize(dir: &Path) -> PathBuf {
    std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_dir_same_lock() {
        let locks = DirLocks::new();
        let a = locks.for_dir(Path::new("/tmp/clips"));
        let b = locks.for_dir(Path::new("/tmp/clips"));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_different_dirs_different_locks() {
        let locks = DirLocks::new();
        let a = locks.for_dir(Path::new("/tmp/clips"));
        let b = locks.for_dir(Path::new("/tmp/other"));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_spellings_normalize() {
        let dir = tempfile::tempdir().unwrap();
        let locks = DirLocks::new();
        let a = locks.for_dir(dir.path());
        let b = locks.for_dir(&dir.path().join(".").join("..").join(
            dir.path().file_name().unwrap(),
        ));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_lock_serializes() {
        let locks = DirLocks::new();
        let lock = locks.for_dir(Path::new("/tmp/clips"));

        let guard = lock.lock().await;
        assert!(locks.for_dir(Path::new("/tmp/clips")).try_lock().is_err());
        drop(guard);
        assert!(locks.for_dir(Path::new("/tmp/clips")).try_lock().is_ok());
    }
}
