//! Store pruning

use crate::cafs::{FILES_DIR, INDEX_SUFFIX, TMP_DIR};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// What a prune removed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneReport {
    pub removed_files: u64,
    pub removed_bytes: u64,
}

/// Removes store content no project uses
#[async_trait]
pub trait Pruner: Send + Sync {
    async fn prune(&self, store_dir: &Path) -> StoreResult<PruneReport>;
}

/// Prunes by hard-link count
///
/// Content with a single link is referenced by no project. Files indexes are
/// kept, and so is everything on platforms without link counts. The scratch
/// directory is always emptied, so this must not run alongside an install.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkCountPruner;

#[async_trait]
impl Pruner for LinkCountPruner {
    async fn prune(&self, store_dir: &Path) -> StoreResult<PruneReport> {
        let tmp = store_dir.join(TMP_DIR);
        match fs::remove_dir_all(&tmp).await {
            Ok(()) => debug!("Removed {}", tmp.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(format!("removing {}", tmp.display()), e)),
        }

        let files_dir = store_dir.join(FILES_DIR);
        let mut report = PruneReport::default();
        let mut buckets = match fs::read_dir(&files_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(StoreError::io(format!("reading {}", files_dir.display()), e)),
        };

        while let Some(bucket) = buckets
            .next_entry()
            .await
            .map_err(|e| StoreError::io("reading store bucket", e))?
        {
            if !bucket.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let mut entries = fs::read_dir(bucket.path())
                .await
                .map_err(|e| StoreError::io(format!("reading {}", bucket.path().display()), e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::io("reading store entry", e))?
            {
                if entry.file_name().to_string_lossy().ends_with(INDEX_SUFFIX) {
                    continue;
                }
                let metadata = entry
                    .metadata()
                    .await
                    .map_err(|e| StoreError::io(format!("stat {}", entry.path().display()), e))?;
                if metadata.is_file() && is_unreferenced(&metadata) {
                    fs::remove_file(entry.path()).await.map_err(|e| {
                        StoreError::io(format!("removing {}", entry.path().display()), e)
                    })?;
                    report.removed_files += 1;
                    report.removed_bytes += metadata.len();
                }
            }
        }

        info!(
            "Pruned {} files ({} bytes) from {}",
            report.removed_files,
            report.removed_bytes,
            store_dir.display()
        );
        Ok(report)
    }
}

#[cfg(unix)]
fn is_unreferenced(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    metadata.nlink() == 1
}

#[cfg(not(unix))]
fn is_unreferenced(_metadata: &std::fs::Metadata) -> bool {
    false
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn removes_unlinked_content_and_tmp() {
        let store = TempDir::new().unwrap();
        let bucket = store.path().join(FILES_DIR).join("ab");
        std::fs::create_dir_all(&bucket).unwrap();
        std::fs::create_dir_all(store.path().join(TMP_DIR).join("orphan")).unwrap();

        std::fs::write(bucket.join("unused"), "12345").unwrap();
        std::fs::write(bucket.join("used"), "abc").unwrap();
        std::fs::write(bucket.join(format!("cdef{}", INDEX_SUFFIX)), "{}").unwrap();
        let project = TempDir::new().unwrap();
        std::fs::hard_link(bucket.join("used"), project.path().join("index.js")).unwrap();

        let report = LinkCountPruner.prune(store.path()).await.unwrap();

        assert_eq!(
            report,
            PruneReport {
                removed_files: 1,
                removed_bytes: 5
            }
        );
        assert!(!bucket.join("unused").exists());
        assert!(bucket.join("used").exists());
        assert!(bucket.join(format!("cdef{}", INDEX_SUFFIX)).exists());
        assert!(!store.path().join(TMP_DIR).exists());
    }

    #[tokio::test]
    async fn empty_store_is_fine() {
        let store = TempDir::new().unwrap();
        let report = LinkCountPruner.prune(store.path()).await.unwrap();
        assert_eq!(report, PruneReport::default());
    }
}
