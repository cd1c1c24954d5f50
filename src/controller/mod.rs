//! Store controller
//!
//! The single entry point the rest of the package manager talks to. It owns
//! the content store and composes the importer, the side effects recorder,
//! and the requester and pruner supplied by the caller.

mod prune;
mod requester;

pub use prune::{LinkCountPruner, PruneReport, Pruner};
pub use requester::{
    FetchPackageOptions, FetchResponse, PackageRequester, PackageResponse, RequestPackageOptions,
    RequesterContext, RequesterFactory, WantedDependency,
};

use crate::cafs::{ContentStore, LocalContentStore};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::files_index::{self, FilesIndex};
use crate::import::{
    FsImporterFactory, ImportOutcome, ImportPackageOptions, ImporterFactory, PackageImporter,
};
use crate::side_effects::{self, SideEffectsRecorder, UploadOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Assembles a [`StoreController`]; every collaborator has a default except
/// the requester
pub struct StoreControllerBuilder {
    config: StoreConfig,
    content_store: Option<Arc<dyn ContentStore>>,
    importer_factory: Option<Arc<dyn ImporterFactory>>,
    requester_factory: Option<RequesterFactory>,
    pruner: Option<Arc<dyn Pruner>>,
}

impl StoreControllerBuilder {
    pub fn content_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.content_store = Some(store);
        self
    }

    pub fn importer_factory(mut self, factory: Arc<dyn ImporterFactory>) -> Self {
        self.importer_factory = Some(factory);
        self
    }

    pub fn requester_factory(mut self, factory: RequesterFactory) -> Self {
        self.requester_factory = Some(factory);
        self
    }

    pub fn pruner(mut self, pruner: Arc<dyn Pruner>) -> Self {
        self.pruner = Some(pruner);
        self
    }

    pub fn build(self) -> StoreController {
        let config = self.config;
        let ignore_file = config.ignore_file();
        let store = self.content_store.unwrap_or_else(|| {
            Arc::new(LocalContentStore::new(config.dir.clone(), ignore_file.clone()))
        });
        let factory = self
            .importer_factory
            .unwrap_or_else(|| Arc::new(FsImporterFactory));

        let requester = self.requester_factory.map(|create| {
            create(RequesterContext {
                store: store.clone(),
                store_dir: store.store_dir().to_path_buf(),
                force: config.force,
                verify_store_integrity: config.verify_store_integrity,
                network_concurrency: config.network_concurrency,
                ignore_file,
            })
        });

        debug!(
            "Store controller at {} (import method: {})",
            store.store_dir().display(),
            config.package_import_method
        );

        StoreController {
            importer: PackageImporter::new(store.clone(), config.package_import_method, factory),
            recorder: SideEffectsRecorder::new(store.clone(), config.recover_corrupt_index),
            pruner: self.pruner.unwrap_or_else(|| Arc::new(LinkCountPruner)),
            store,
            requester,
            force: config.force,
            closed: AtomicBool::new(false),
        }
    }
}

/// Facade over one package store
pub struct StoreController {
    store: Arc<dyn ContentStore>,
    importer: PackageImporter,
    recorder: SideEffectsRecorder,
    requester: Option<Arc<dyn PackageRequester>>,
    pruner: Arc<dyn Pruner>,
    force: bool,
    closed: AtomicBool,
}

impl StoreController {
    pub fn builder(config: StoreConfig) -> StoreControllerBuilder {
        StoreControllerBuilder {
            config,
            content_store: None,
            importer_factory: None,
            requester_factory: None,
            pruner: None,
        }
    }

    /// Root directory of the store
    pub fn store_dir(&self) -> &Path {
        self.store.store_dir()
    }

    pub fn content_store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Importers constructed so far, one per strategy used
    pub fn importers(&self) -> usize {
        self.importer.strategies().len()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn requester(&self) -> StoreResult<&Arc<dyn PackageRequester>> {
        self.ensure_open()?;
        self.requester.as_ref().ok_or(StoreError::RequesterUnavailable)
    }

    /// Resolve a dependency and, unless skipped, fetch it into the store
    pub async fn request_package(
        &self,
        wanted: &WantedDependency,
        opts: &RequestPackageOptions,
    ) -> StoreResult<PackageResponse> {
        self.requester()?.request_package(wanted, opts).await
    }

    /// Fetch an already resolved package into the store
    pub async fn fetch_package_to_store(
        &self,
        opts: &FetchPackageOptions,
    ) -> StoreResult<FetchResponse> {
        self.requester()?.fetch_package_to_store(opts).await
    }

    /// Materialize a package at `dest`
    pub async fn import_package(
        &self,
        dest: &Path,
        mut opts: ImportPackageOptions,
    ) -> StoreResult<ImportOutcome> {
        self.ensure_open()?;
        opts.force |= self.force;
        self.importer.import_package(dest, opts).await
    }

    /// Record a build output as the side effects for `opts.engine`
    pub async fn upload(&self, built_dir: &Path, opts: &UploadOptions) -> StoreResult<()> {
        self.ensure_open()?;
        self.recorder.upload(built_dir, opts).await
    }

    /// Remove content no project references
    pub async fn prune(&self) -> StoreResult<PruneReport> {
        self.ensure_open()?;
        self.pruner.prune(self.store.store_dir()).await
    }

    /// Fresh directory under the store root; the caller removes it
    pub async fn temp_dir(&self) -> StoreResult<PathBuf> {
        self.ensure_open()?;
        self.store.allocate_temp_dir().await
    }

    /// Add a directory to the store and build its files index
    pub async fn add_files_from_dir(&self, dir: &Path) -> StoreResult<FilesIndex> {
        self.ensure_open()?;
        let files = side_effects::add_files_from_dir(self.store.as_ref(), dir).await?;
        info!("Added {} files from {}", files.len(), dir.display());
        Ok(FilesIndex::new(files))
    }

    /// Persist a files index atomically
    pub async fn write_files_index(&self, path: &Path, index: &FilesIndex) -> StoreResult<()> {
        self.ensure_open()?;
        files_index::write(path, index).await
    }

    /// Stop accepting operations. Safe to call more than once.
    pub async fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed store controller at {}", self.store_dir().display());
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
