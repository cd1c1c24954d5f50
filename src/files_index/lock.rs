//! Per-path async locks for read-merge-write cycles on index files

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes critical sections that share a file path
///
/// Entries are created on first use and dropped once no caller holds or
/// waits on them, so the map only grows with in-flight paths.
#[derive(Default)]
pub struct IndexLocks {
    locks: Mutex<HashMap<PathBuf, Slot>>,
}

struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    /// Callers holding or waiting on `mutex`
    users: usize,
}

/// Held while a caller owns the critical section for one path
///
/// Also registered while the caller is still waiting, so a cancelled
/// `lock` future releases its claim on the entry.
pub struct IndexGuard<'a> {
    owner: &'a IndexLocks,
    path: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl IndexLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `path`
    pub async fn lock(&self, path: &Path) -> IndexGuard<'_> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            let slot = locks.entry(path.to_path_buf()).or_insert_with(|| Slot {
                mutex: Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            slot.users += 1;
            slot.mutex.clone()
        };
        let mut guard = IndexGuard {
            owner: self,
            path: path.to_path_buf(),
            guard: None,
        };
        guard.guard = Some(mutex.lock_owned().await);
        guard
    }

    /// Number of paths currently tracked
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for IndexGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.owner.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = locks.get_mut(&self.path) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                locks.remove(&self.path);
            }
        }
    }
}
