//! Persisted per-package files index
//!
//! One JSON document per package version records the canonical file listing
//! and, under `sideEffects`, one listing per engine the package was built for.
//! Fields this crate does not know about (`name`, `version`, ...) survive a
//! rewrite untouched.

mod lock;

pub use lock::{IndexGuard, IndexLocks};

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// One content-addressed file record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Milliseconds since the Unix epoch of the last integrity check
    #[serde(default)]
    pub checked_at: i64,
    /// Integrity string of the content
    pub integrity: String,
    /// Permission bits
    pub mode: u32,
    /// Size in bytes
    pub size: u64,
}

/// Relative file name to file record
pub type FileMap = BTreeMap<String, FileInfo>;

/// Engine signature to the file listing built for it
pub type SideEffects = BTreeMap<String, FileMap>;

/// Files index document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesIndex {
    /// Canonical, unbuilt file listing
    pub files: FileMap,

    /// Built variants keyed by engine signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_effects: Option<SideEffects>,

    /// Unknown top-level fields, preserved on rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FilesIndex {
    /// Create an index with only a canonical listing
    pub fn new(files: FileMap) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    /// Record the listing built for `engine`, replacing only that engine's entry
    pub fn record_side_effects(&mut self, engine: &str, files: FileMap) {
        self.side_effects
            .get_or_insert_with(SideEffects::new)
            .insert(engine.to_string(), files);
    }

    /// Listing built for `engine`, if one was recorded
    pub fn side_effects_for(&self, engine: &str) -> Option<&FileMap> {
        self.side_effects.as_ref()?.get(engine)
    }
}

/// Read an index file
///
/// Returns `Ok(None)` when the file does not exist. Any other read failure
/// and any parse failure is `IndexCorrupt`.
pub async fn read(path: &Path) -> StoreResult<Option<FilesIndex>> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::IndexCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };

    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|e| StoreError::IndexCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Write an index file atomically
///
/// The document is written next to the target and renamed over it, so a
/// concurrent reader sees either the old or the new index, never a mix.
pub async fn write(path: &Path, index: &FilesIndex) -> StoreResult<()> {
    let write_err = |source: std::io::Error| StoreError::IndexWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let content = serde_json::to_vec(index)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staged = path.with_file_name(format!("{}.{}.tmp", file_name, Uuid::new_v4()));

    fs::write(&staged, &content).await.map_err(write_err)?;
    if let Err(e) = fs::rename(&staged, path).await {
        let _ = fs::remove_file(&staged).await;
        return Err(write_err(e));
    }

    debug!("Wrote files index {}", path.display());
    Ok(())
}
