//! Filesystem primitives shared by the importers
//!
//! Every import is staged in a sibling directory of the destination and
//! renamed into place once all files are written.

use super::{FilesMap, ImportRequest};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeSet;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Files placed concurrently within one package
const FILE_CONCURRENCY: usize = 16;

/// How a single file is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileOp {
    Clone,
    /// Hard link, failing if the link cannot be made
    Link,
    /// Hard link, copying any file that cannot be linked
    LinkOrCopy,
    Copy,
}

/// What an import actually did with the package's files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Placed {
    pub total: usize,
    pub linked: usize,
}

impl Placed {
    /// Every file fell back to a copy
    pub fn all_copied(&self) -> bool {
        self.total > 0 && self.linked == 0
    }
}

/// Whether the destination already holds a package imported from the store
pub(crate) async fn is_already_imported(dest: &Path, request: &ImportRequest) -> bool {
    request.from_store
        && !request.force
        && fs::try_exists(dest.join("package.json")).await.unwrap_or(false)
}

/// Place every file of `files_map` under `dest`, replacing what was there.
///
/// On failure the staging directory is removed and `dest` is left as it was.
pub(crate) async fn import_indexed_dir(
    dest: &Path,
    files_map: &FilesMap,
    op: FileOp,
) -> io::Result<Placed> {
    validate_names(files_map)?;

    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).await?;

    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pkg".to_string());
    let staging = parent.join(format!("{}_tmp_{}", name, Uuid::new_v4()));

    let placed = match populate(&staging, files_map, op).await {
        Ok(placed) => placed,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging).await;
            return Err(e);
        }
    };

    if let Err(e) = replace_dir(&staging, dest).await {
        let _ = fs::remove_dir_all(&staging).await;
        return Err(e);
    }

    debug!(
        "Imported {} files into {} ({:?}, {} linked)",
        placed.total,
        dest.display(),
        op,
        placed.linked
    );
    Ok(placed)
}

async fn populate(staging: &Path, files_map: &FilesMap, op: FileOp) -> io::Result<Placed> {
    fs::create_dir_all(staging).await?;

    let dirs: BTreeSet<PathBuf> = files_map
        .keys()
        .filter_map(|name| Path::new(name).parent().map(Path::to_path_buf))
        .filter(|dir| !dir.as_os_str().is_empty())
        .collect();
    for dir in dirs {
        fs::create_dir_all(staging.join(dir)).await?;
    }

    let jobs: Vec<(PathBuf, PathBuf)> = files_map
        .iter()
        .map(|(name, src)| (src.clone(), staging.join(name)))
        .collect();
    let total = jobs.len();

    let linked = stream::iter(jobs)
        .map(|(src, dst)| async move { place_file(op, &src, dst).await })
        .buffer_unordered(FILE_CONCURRENCY)
        .try_fold(0usize, |linked, was_linked| async move {
            Ok(linked + usize::from(was_linked))
        })
        .await?;

    Ok(Placed { total, linked })
}

async fn replace_dir(staging: &Path, dest: &Path) -> io::Result<()> {
    match fs::symlink_metadata(dest).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dest).await?,
        Ok(_) => fs::remove_file(dest).await?,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::rename(staging, dest).await
}

/// Reject names that would escape the destination
fn validate_names(files_map: &FilesMap) -> io::Result<()> {
    for name in files_map.keys() {
        let escapes = Path::new(name)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid file name in package: '{}'", name),
            ));
        }
    }
    Ok(())
}

/// Place one file; `true` when it ended up hard-linked
async fn place_file(op: FileOp, src: &Path, dst: PathBuf) -> io::Result<bool> {
    match op {
        FileOp::Clone => clone_file(src, &dst).await.map(|_| false),
        FileOp::Link => fs::hard_link(src, &dst).await.map(|_| true),
        FileOp::LinkOrCopy => match fs::hard_link(src, &dst).await {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!("Hard link of {} failed ({}), copying", src.display(), e);
                fs::copy(src, &dst).await.map(|_| false)
            }
        },
        FileOp::Copy => fs::copy(src, &dst).await.map(|_| false),
    }
}

/// Copy-on-write clone of a single file
pub(crate) async fn clone_file(src: &Path, dst: &Path) -> io::Result<()> {
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    tokio::task::spawn_blocking(move || clone_file_blocking(&src, &dst))
        .await
        .map_err(io::Error::other)?
}

#[cfg(target_os = "linux")]
fn clone_file_blocking(src: &Path, dst: &Path) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let source = std::fs::File::open(src)?;
    let target = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst)?;

    // SAFETY: both descriptors are open for the duration of the call
    let ret = unsafe { libc::ioctl(target.as_raw_fd(), libc::FICLONE, source.as_raw_fd()) };
    if ret == -1 {
        let err = io::Error::last_os_error();
        drop(target);
        let _ = std::fs::remove_file(dst);
        return Err(unsupported_if_no_cow(err));
    }

    std::fs::set_permissions(dst, source.metadata()?.permissions())
}

#[cfg(target_os = "macos")]
fn clone_file_blocking(src: &Path, dst: &Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let to_cstring = |p: &Path| {
        CString::new(p.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))
    };
    let src_c = to_cstring(src)?;
    let dst_c = to_cstring(dst)?;

    // SAFETY: both pointers come from live, NUL-terminated CStrings
    let ret = unsafe { libc::clonefile(src_c.as_ptr(), dst_c.as_ptr(), 0) };
    if ret == -1 {
        return Err(unsupported_if_no_cow(io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn clone_file_blocking(_src: &Path, _dst: &Path) -> io::Result<()> {
    Err(io::Error::new(
        ErrorKind::Unsupported,
        "copy-on-write clones are not available on this platform",
    ))
}

/// Map the errno values a filesystem without reflinks returns to `Unsupported`
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn unsupported_if_no_cow(err: io::Error) -> io::Error {
    const NO_COW: [i32; 5] = [
        libc::EOPNOTSUPP,
        libc::ENOTSUP,
        libc::EXDEV,
        libc::EINVAL,
        libc::ENOTTY,
    ];
    match err.raw_os_error() {
        Some(code) if NO_COW.contains(&code) => io::Error::new(ErrorKind::Unsupported, err),
        _ => err,
    }
}
