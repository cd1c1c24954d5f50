//! Content-addressable file store
//!
//! Files are stored once, keyed by the SHA-512 of their bytes and by whether
//! they are executable. Every package that ships an identical file shares the
//! same store entry.
//!
//! # Layout
//!
//! | Path | Contents |
//! |------|----------|
//! | `files/<hex[0..2]>/<hex[2..]>` | regular file content |
//! | `files/<hex[0..2]>/<hex[2..]>-exec` | executable file content |
//! | `files/<hex[0..2]>/<hex[2..]>-index.json` | files index of a package tarball |
//! | `tmp/` | scratch space, safe to delete while idle |

pub mod integrity;
mod local;
pub mod walk;

pub use local::LocalContentStore;

use crate::error::StoreResult;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory holding content under the store root
pub const FILES_DIR: &str = "files";

/// Scratch directory under the store root
pub const TMP_DIR: &str = "tmp";

const EXEC_SUFFIX: &str = "-exec";

/// File name suffix of files indexes kept inside `files/`
pub const INDEX_SUFFIX: &str = "-index.json";

/// Outcome of persisting one file's bytes into the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWriteResult {
    /// Integrity string of the stored bytes
    pub integrity: String,
    /// Milliseconds since the Unix epoch when the hash was computed
    pub checked_at: i64,
}

/// Integrity computation that completes once the file is in the store
pub type PendingWrite = BoxFuture<'static, StoreResult<FileWriteResult>>;

/// One file found while ingesting a directory
pub struct IngestedFile {
    /// Permission bits of the source file
    pub mode: u32,
    /// Size in bytes
    pub size: u64,
    /// Resolves when the bytes are hashed and persisted
    pub write_result: PendingWrite,
}

/// Files found under an ingested directory, keyed by `/`-separated relative name
pub type IngestedFiles = BTreeMap<String, IngestedFile>;

/// Durable content-addressable storage consumed by the store controller
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Root directory of the store
    fn store_dir(&self) -> &Path;

    /// Absolute path of the content with this integrity and mode.
    ///
    /// Pure and total: the same inputs always yield the same path.
    fn path_for(&self, integrity: &str, mode: u32) -> PathBuf {
        content_path(&self.store_dir().join(FILES_DIR), integrity, mode)
    }

    /// Where the files index of a package with this tarball integrity lives
    fn index_path_for(&self, integrity: &str) -> PathBuf {
        let hex = integrity::to_hex(integrity);
        let (prefix, rest) = hex.split_at(2);
        self.store_dir()
            .join(FILES_DIR)
            .join(prefix)
            .join(format!("{}{}", rest, INDEX_SUFFIX))
    }

    /// Add every regular file under `dir` to the store
    async fn ingest_directory(&self, dir: &Path) -> StoreResult<IngestedFiles>;

    /// Create a fresh scratch directory under the store root
    async fn allocate_temp_dir(&self) -> StoreResult<PathBuf>;
}

/// Whether any execute bit is set
pub fn is_executable(mode: u32) -> bool {
    mode & 0o111 != 0
}

/// Content path for an integrity string inside a `files/` directory
pub fn content_path(files_dir: &Path, integrity: &str, mode: u32) -> PathBuf {
    let hex = integrity::to_hex(integrity);
    let (prefix, rest) = hex.split_at(2);
    let mut name = rest.to_string();
    if is_executable(mode) {
        name.push_str(EXEC_SUFFIX);
    }
    files_dir.join(prefix).join(name)
}
