//! Recording build outputs ("side effects") in a package's files index
//!
//! After a package's build step runs, its output directory is added to the
//! store and the resulting listing is merged into the package's files index
//! under the engine signature it was built for. Listings recorded for other
//! engines, and the unbuilt listing, are never touched.

use crate::cafs::ContentStore;
use crate::error::{StoreError, StoreResult};
use crate::files_index::{self, FileInfo, FileMap, FilesIndex, IndexLocks};
use futures_util::future::try_join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where and for which engine a build output is recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Files index of the package that was built
    pub files_index_file: PathBuf,
    /// Engine signature of the build
    pub engine: String,
}

/// Add every file under `dir` to the store and wait for all of them.
///
/// Integrity computations run concurrently; the listing is only returned
/// once every file has been persisted.
pub async fn add_files_from_dir(store: &dyn ContentStore, dir: &Path) -> StoreResult<FileMap> {
    let ingested = store.ingest_directory(dir).await?;

    let entries = try_join_all(ingested.into_iter().map(|(name, file)| async move {
        let written = file.write_result.await?;
        let info = FileInfo {
            checked_at: written.checked_at,
            integrity: written.integrity,
            mode: file.mode,
            size: file.size,
        };
        Ok::<_, StoreError>((name, info))
    }))
    .await?;

    Ok(entries.into_iter().collect())
}

/// Merges build outputs into files indexes
pub struct SideEffectsRecorder {
    store: Arc<dyn ContentStore>,
    locks: IndexLocks,
    recover_corrupt_index: bool,
}

impl SideEffectsRecorder {
    pub fn new(store: Arc<dyn ContentStore>, recover_corrupt_index: bool) -> Self {
        Self {
            store,
            locks: IndexLocks::new(),
            recover_corrupt_index,
        }
    }

    /// Record the contents of `built_dir` as the side effects for `opts.engine`.
    ///
    /// Nothing is written unless every file reached the store. Uploads to the
    /// same index file are serialized so concurrent engines cannot drop each
    /// other's entries.
    pub async fn upload(&self, built_dir: &Path, opts: &UploadOptions) -> StoreResult<()> {
        let listing = add_files_from_dir(self.store.as_ref(), built_dir).await?;
        debug!(
            "Computed integrity for {} built files of {}",
            listing.len(),
            built_dir.display()
        );

        let path = &opts.files_index_file;
        let _guard = self.locks.lock(path).await;

        let mut index = self.load_or_fresh(path, &listing).await?;
        index.record_side_effects(&opts.engine, listing);
        files_index::write(path, &index).await?;

        info!(
            "Recorded side effects for engine {} in {}",
            opts.engine,
            path.display()
        );
        Ok(())
    }

    async fn load_or_fresh(&self, path: &Path, listing: &FileMap) -> StoreResult<FilesIndex> {
        match files_index::read(path).await {
            Ok(Some(index)) => Ok(index),
            Ok(None) => {
                debug!("No files index at {}, starting a new one", path.display());
                Ok(FilesIndex::new(listing.clone()))
            }
            Err(StoreError::IndexCorrupt { reason, .. }) if self.recover_corrupt_index => {
                warn!(
                    "Files index {} is unreadable ({}); rebuilding it, earlier side effects are lost",
                    path.display(),
                    reason
                );
                Ok(FilesIndex::new(listing.clone()))
            }
            Err(e) => Err(e),
        }
    }
}
