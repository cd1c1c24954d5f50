//! Listing of the regular files under a package directory

use crate::config::IgnoreFile;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// A regular file found under the walked directory
#[derive(Debug)]
pub struct WalkedFile {
    /// `/`-separated path relative to the walked directory
    pub relative: String,
    pub path: PathBuf,
    pub metadata: Metadata,
}

/// Regular files under `dir`, sorted by relative name.
///
/// Symlinks are not followed and never listed. An entry whose file name
/// matches `ignore` is skipped together with everything below it.
pub async fn regular_files(dir: &Path, ignore: Option<IgnoreFile>) -> io::Result<Vec<WalkedFile>> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || walk(&dir, ignore.as_ref()))
        .await
        .map_err(io::Error::other)?
}

fn walk(dir: &Path, ignore: Option<&IgnoreFile>) -> io::Result<Vec<WalkedFile>> {
    let entries = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let ignored = ignore.is_some_and(|ignore| ignore(&entry.file_name().to_string_lossy()));
            if ignored {
                debug!("Ignoring {}", entry.path().display());
            }
            !ignored
        });

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = entry.metadata()?;
        files.push(WalkedFile {
            relative: relative_name(dir, entry.path()),
            path: entry.into_path(),
            metadata,
        });
    }
    Ok(files)
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
