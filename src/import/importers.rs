//! Importer implementations, one per strategy

use super::fs::{import_indexed_dir, is_already_imported, FileOp, Placed};
use super::strategy::ImporterFactory;
use super::{ImportMethod, ImportRequest, ImportStrategy, Importer};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds the filesystem importers
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImporterFactory;

impl ImporterFactory for FsImporterFactory {
    fn create(&self, strategy: ImportStrategy) -> Arc<dyn Importer> {
        match strategy {
            ImportStrategy::Auto => Arc::new(AutoImporter::default()),
            ImportStrategy::Hardlink => Arc::new(MethodImporter::new(ImportMethod::Hardlink)),
            ImportStrategy::Copy => Arc::new(MethodImporter::new(ImportMethod::Copy)),
            ImportStrategy::Clone => Arc::new(MethodImporter::new(ImportMethod::Clone)),
            ImportStrategy::CloneOrCopy => Arc::new(CloneOrCopyImporter::default()),
        }
    }
}

fn to_store_error(dest: &Path, method: ImportMethod, err: std::io::Error) -> StoreError {
    if method == ImportMethod::Clone && err.kind() == ErrorKind::Unsupported {
        StoreError::CloneUnsupported(err.to_string())
    } else {
        StoreError::import_failed(dest, format!("{} failed: {}", method, err))
    }
}

/// Hardlink imports whose every file fell back to a copy report copy
fn reported(method: ImportMethod, placed: Placed) -> ImportMethod {
    if method == ImportMethod::Hardlink && placed.all_copied() {
        ImportMethod::Copy
    } else {
        method
    }
}

/// Importer bound to a single method
///
/// Hardlink falls back to copying any file that cannot be linked, such as one
/// on another device. Clone failures are fatal.
struct MethodImporter {
    method: ImportMethod,
}

impl MethodImporter {
    fn new(method: ImportMethod) -> Self {
        Self { method }
    }

    fn file_op(&self) -> FileOp {
        match self.method {
            ImportMethod::Hardlink => FileOp::LinkOrCopy,
            ImportMethod::Copy => FileOp::Copy,
            ImportMethod::Clone => FileOp::Clone,
        }
    }
}

#[async_trait]
impl Importer for MethodImporter {
    async fn import(
        &self,
        dest: &Path,
        request: &ImportRequest,
    ) -> StoreResult<Option<ImportMethod>> {
        if is_already_imported(dest, request).await {
            return Ok(None);
        }
        let placed = import_indexed_dir(dest, &request.files_map, self.file_op())
            .await
            .map_err(|e| to_store_error(dest, self.method, e))?;
        Ok(Some(reported(self.method, placed)))
    }
}

/// Clones while the filesystem allows it, then copies for good
///
/// Only an `Unsupported` clone error switches to copy-only; any other
/// failure copies that one package and keeps cloning afterwards.
#[derive(Default)]
struct CloneOrCopyImporter {
    copy_only: AtomicBool,
}

#[async_trait]
impl Importer for CloneOrCopyImporter {
    async fn import(
        &self,
        dest: &Path,
        request: &ImportRequest,
    ) -> StoreResult<Option<ImportMethod>> {
        if is_already_imported(dest, request).await {
            return Ok(None);
        }

        if !self.copy_only.load(Ordering::Acquire) {
            match import_indexed_dir(dest, &request.files_map, FileOp::Clone).await {
                Ok(_) => return Ok(Some(ImportMethod::Clone)),
                Err(e) if e.kind() == ErrorKind::Unsupported => {
                    warn!("Cloning is not supported here ({}), copying from now on", e);
                    self.copy_only.store(true, Ordering::Release);
                }
                Err(e) => {
                    warn!("Cloning into {} failed ({}), copying this package", dest.display(), e)
                }
            }
        }

        import_indexed_dir(dest, &request.files_map, FileOp::Copy)
            .await
            .map_err(|e| to_store_error(dest, ImportMethod::Copy, e))?;
        Ok(Some(ImportMethod::Copy))
    }
}

const UNDECIDED: u8 = 0;

/// Probes clone, then hardlink, then copy; the first that works sticks
#[derive(Default)]
struct AutoImporter {
    chosen: AtomicU8,
}

impl AutoImporter {
    fn encode(method: ImportMethod) -> u8 {
        match method {
            ImportMethod::Clone => 1,
            ImportMethod::Hardlink => 2,
            ImportMethod::Copy => 3,
        }
    }

    fn decode(value: u8) -> Option<ImportMethod> {
        match value {
            1 => Some(ImportMethod::Clone),
            2 => Some(ImportMethod::Hardlink),
            3 => Some(ImportMethod::Copy),
            _ => None,
        }
    }

    /// Strict ops while probing, so a failed link moves on to copy
    fn probe_op(method: ImportMethod) -> FileOp {
        match method {
            ImportMethod::Clone => FileOp::Clone,
            ImportMethod::Hardlink => FileOp::Link,
            ImportMethod::Copy => FileOp::Copy,
        }
    }

    /// Once hardlink is chosen, files that cannot be linked are copied
    fn sticky_op(method: ImportMethod) -> FileOp {
        match method {
            ImportMethod::Hardlink => FileOp::LinkOrCopy,
            other => Self::probe_op(other),
        }
    }

    async fn probe(&self, dest: &Path, request: &ImportRequest) -> StoreResult<ImportMethod> {
        let candidates = [ImportMethod::Clone, ImportMethod::Hardlink];
        for method in candidates {
            match import_indexed_dir(dest, &request.files_map, Self::probe_op(method)).await {
                Ok(_) => {
                    info!("Using {} as the package import method", method);
                    return Ok(method);
                }
                Err(e) => debug!("{} import into {} failed: {}", method, dest.display(), e),
            }
        }

        import_indexed_dir(dest, &request.files_map, FileOp::Copy)
            .await
            .map_err(|e| to_store_error(dest, ImportMethod::Copy, e))?;
        info!("Using copy as the package import method");
        Ok(ImportMethod::Copy)
    }
}

#[async_trait]
impl Importer for AutoImporter {
    async fn import(
        &self,
        dest: &Path,
        request: &ImportRequest,
    ) -> StoreResult<Option<ImportMethod>> {
        if is_already_imported(dest, request).await {
            return Ok(None);
        }

        if let Some(method) = Self::decode(self.chosen.load(Ordering::Acquire)) {
            let placed = import_indexed_dir(dest, &request.files_map, Self::sticky_op(method))
                .await
                .map_err(|e| to_store_error(dest, method, e))?;
            return Ok(Some(reported(method, placed)));
        }

        let method = self.probe(dest, request).await?;
        let _ = self.chosen.compare_exchange(
            UNDECIDED,
            Self::encode(method),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        Ok(Some(method))
    }
}
