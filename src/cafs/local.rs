//! Filesystem-backed content store

use super::{
    content_path, integrity, is_executable, walk, ContentStore, FileWriteResult, IngestedFile,
    IngestedFiles, FILES_DIR, TMP_DIR,
};
use crate::config::IgnoreFile;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Content store rooted at a directory on the local filesystem
pub struct LocalContentStore {
    store_dir: PathBuf,
    ignore_file: Option<IgnoreFile>,
}

impl LocalContentStore {
    /// Create a store rooted at `store_dir`; nothing is created until used
    pub fn new(store_dir: impl Into<PathBuf>, ignore_file: Option<IgnoreFile>) -> Self {
        Self {
            store_dir: store_dir.into(),
            ignore_file,
        }
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    async fn ingest_directory(&self, dir: &Path) -> StoreResult<IngestedFiles> {
        let files_dir = self.store_dir.join(FILES_DIR);
        let tmp_dir = self.store_dir.join(TMP_DIR);

        let walked = walk::regular_files(dir, self.ignore_file.clone())
            .await
            .map_err(|e| StoreError::Ingest {
                path: dir.to_path_buf(),
                source: e,
            })?;

        let mut ingested = IngestedFiles::new();
        for file in walked {
            let mode = file_mode(&file.metadata);
            let write_result = Box::pin(write_file(
                file.path,
                files_dir.clone(),
                tmp_dir.clone(),
                mode,
            ));
            ingested.insert(
                file.relative,
                IngestedFile {
                    mode,
                    size: file.metadata.len(),
                    write_result,
                },
            );
        }

        debug!("Ingesting {} files from {}", ingested.len(), dir.display());
        Ok(ingested)
    }

    async fn allocate_temp_dir(&self) -> StoreResult<PathBuf> {
        let tmp = self.store_dir.join(TMP_DIR).join(Uuid::new_v4().to_string());
        fs::create_dir_all(&tmp)
            .await
            .map_err(|e| StoreError::io(format!("creating temp dir {}", tmp.display()), e))?;
        debug!("Allocated temp dir {}", tmp.display());
        Ok(tmp)
    }
}

/// Hash a file and move its bytes into the store if not already present
async fn write_file(
    src: PathBuf,
    files_dir: PathBuf,
    tmp_dir: PathBuf,
    mode: u32,
) -> StoreResult<FileWriteResult> {
    let bytes = fs::read(&src).await.map_err(|e| StoreError::Ingest {
        path: src.clone(),
        source: e,
    })?;
    let integrity = integrity::compute(&bytes);
    let target = content_path(&files_dir, &integrity, mode);

    if fs::try_exists(&target).await.unwrap_or(false) {
        return Ok(FileWriteResult {
            integrity,
            checked_at: Utc::now().timestamp_millis(),
        });
    }

    let ingest_err = |source: std::io::Error| StoreError::Ingest {
        path: src.clone(),
        source,
    };

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await.map_err(ingest_err)?;
    }
    fs::create_dir_all(&tmp_dir).await.map_err(ingest_err)?;

    let staged = tmp_dir.join(Uuid::new_v4().to_string());
    fs::write(&staged, &bytes).await.map_err(ingest_err)?;
    set_store_mode(&staged, mode).await.map_err(ingest_err)?;

    if let Err(e) = fs::rename(&staged, &target).await {
        let _ = fs::remove_file(&staged).await;
        // Another writer may have stored identical bytes in the meantime
        if !(e.kind() == ErrorKind::AlreadyExists || fs::try_exists(&target).await.unwrap_or(false))
        {
            return Err(ingest_err(e));
        }
    }

    Ok(FileWriteResult {
        integrity,
        checked_at: Utc::now().timestamp_millis(),
    })
}

#[cfg(unix)]
fn file_mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &Metadata) -> u32 {
    0o644
}

#[cfg(unix)]
async fn set_store_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let store_mode = if is_executable(mode) { 0o755 } else { 0o644 };
    fs::set_permissions(path, std::fs::Permissions::from_mode(store_mode)).await
}

#[cfg(not(unix))]
async fn set_store_mode(_path: &Path, mode: u32) -> std::io::Result<()> {
    let _ = is_executable(mode);
    Ok(())
}
