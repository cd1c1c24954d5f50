//! Strategy selection and the per-controller importer cache

use super::resolve::resolve_file_map;
use super::{
    ImportOutcome, ImportPackageOptions, ImportRequest, ImportStrategy, Importer,
    PackageImportMethod,
};
use crate::cafs::ContentStore;
use crate::error::StoreResult;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Constructs the importer for a strategy
pub trait ImporterFactory: Send + Sync {
    fn create(&self, strategy: ImportStrategy) -> Arc<dyn Importer>;
}

/// Inputs of the strategy decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyDecision {
    /// The package runs a build step after import
    pub requires_build: bool,
    /// The resolved files are a prebuilt variant
    pub is_built: bool,
    /// Override carried by the files response
    pub response_override: Option<PackageImportMethod>,
    /// Controller-wide default
    pub configured: PackageImportMethod,
}

type Rule = fn(&StrategyDecision) -> Option<ImportStrategy>;

/// Priority chain; the first rule that answers wins
const RULES: &[(&str, Rule)] = &[
    ("build-without-prebuilt", build_without_prebuilt),
    ("response-override", response_override),
    ("configured-default", configured_default),
];

/// A build will mutate the files, so they must not share inodes with the store
fn build_without_prebuilt(d: &StrategyDecision) -> Option<ImportStrategy> {
    (d.requires_build && !d.is_built).then_some(ImportStrategy::CloneOrCopy)
}

fn response_override(d: &StrategyDecision) -> Option<ImportStrategy> {
    d.response_override.map(ImportStrategy::from)
}

fn configured_default(d: &StrategyDecision) -> Option<ImportStrategy> {
    Some(ImportStrategy::from(d.configured))
}

/// Pick the import strategy for one package
pub fn select_strategy(decision: &StrategyDecision) -> ImportStrategy {
    RULES
        .iter()
        .find_map(|(name, rule)| {
            rule(decision).inspect(|strategy| debug!("Strategy {} chosen by {}", strategy, name))
        })
        .unwrap_or_else(|| ImportStrategy::from(decision.configured))
}

/// One importer per strategy, built on first use and shared afterwards
pub struct StrategyCache {
    factory: Arc<dyn ImporterFactory>,
    importers: Mutex<HashMap<ImportStrategy, Arc<dyn Importer>>>,
}

impl StrategyCache {
    pub fn new(factory: Arc<dyn ImporterFactory>) -> Self {
        Self {
            factory,
            importers: Mutex::new(HashMap::new()),
        }
    }

    /// Importer for `strategy`, constructing it at most once
    pub fn get(&self, strategy: ImportStrategy) -> Arc<dyn Importer> {
        let mut importers = self.importers.lock().unwrap_or_else(|e| e.into_inner());
        importers
            .entry(strategy)
            .or_insert_with(|| {
                debug!("Creating {} importer", strategy);
                self.factory.create(strategy)
            })
            .clone()
    }

    /// Number of importers constructed so far
    pub fn len(&self) -> usize {
        self.importers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves, selects and imports packages for one store controller
pub struct PackageImporter {
    store: Arc<dyn ContentStore>,
    default_method: PackageImportMethod,
    cache: StrategyCache,
}

impl PackageImporter {
    pub fn new(
        store: Arc<dyn ContentStore>,
        default_method: PackageImportMethod,
        factory: Arc<dyn ImporterFactory>,
    ) -> Self {
        Self {
            store,
            default_method,
            cache: StrategyCache::new(factory),
        }
    }

    /// Materialize a package at `dest`
    ///
    /// A failure means the package must be treated as not imported.
    pub async fn import_package(
        &self,
        dest: &Path,
        opts: ImportPackageOptions,
    ) -> StoreResult<ImportOutcome> {
        let from_store = opts.files_response.from_store();
        let response_override = opts.files_response.package_import_method();

        let resolved = resolve_file_map(
            self.store.as_ref(),
            opts.files_response,
            opts.target_engine.as_deref(),
        );

        let strategy = select_strategy(&StrategyDecision {
            requires_build: opts.requires_build,
            is_built: resolved.is_built,
            response_override,
            configured: self.default_method,
        });

        let importer = self.cache.get(strategy);
        let request = ImportRequest {
            files_map: resolved.files_map,
            from_store,
            force: opts.force,
        };
        let import_method = importer.import(dest, &request).await?;

        debug!(
            "Imported {} via {:?} (built: {})",
            dest.display(),
            import_method,
            resolved.is_built
        );
        Ok(ImportOutcome {
            import_method,
            is_built: resolved.is_built,
        })
    }

    /// Importers constructed so far
    pub fn strategies(&self) -> &StrategyCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cafs::LocalContentStore;
    use crate::error::StoreError;
    use crate::files_index::{FileInfo, FileMap, SideEffects};
    use crate::import::{FilesResponse, ImportMethod};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ALL_METHODS: [PackageImportMethod; 4] = [
        PackageImportMethod::Auto,
        PackageImportMethod::Hardlink,
        PackageImportMethod::Copy,
        PackageImportMethod::Clone,
    ];

    /// Records what it was asked to import instead of touching the disk
    struct RecordingImporter {
        strategy: ImportStrategy,
        seen: Mutex<Vec<ImportRequest>>,
    }

    #[async_trait]
    impl Importer for RecordingImporter {
        async fn import(
            &self,
            _dest: &Path,
            request: &ImportRequest,
        ) -> StoreResult<Option<ImportMethod>> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(Some(match self.strategy {
                ImportStrategy::Hardlink => ImportMethod::Hardlink,
                ImportStrategy::Clone => ImportMethod::Clone,
                _ => ImportMethod::Copy,
            }))
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: Mutex<Vec<Arc<RecordingImporter>>>,
        calls: AtomicUsize,
    }

    impl CountingFactory {
        fn strategies(&self) -> Vec<ImportStrategy> {
            self.created.lock().unwrap().iter().map(|i| i.strategy).collect()
        }
    }

    impl ImporterFactory for CountingFactory {
        fn create(&self, strategy: ImportStrategy) -> Arc<dyn Importer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let importer = Arc::new(RecordingImporter {
                strategy,
                seen: Mutex::new(vec![]),
            });
            self.created.lock().unwrap().push(importer.clone());
            importer
        }
    }

    struct FailingImporter;

    #[async_trait]
    impl Importer for FailingImporter {
        async fn import(
            &self,
            dest: &Path,
            _request: &ImportRequest,
        ) -> StoreResult<Option<ImportMethod>> {
            Err(StoreError::import_failed(dest, "read-only filesystem"))
        }
    }

    struct FailingFactory;

    impl ImporterFactory for FailingFactory {
        fn create(&self, _strategy: ImportStrategy) -> Arc<dyn Importer> {
            Arc::new(FailingImporter)
        }
    }

    fn info(integrity: &str, size: u64) -> FileInfo {
        FileInfo {
            checked_at: 0,
            integrity: integrity.to_string(),
            mode: 0o644,
            size,
        }
    }

    fn package_p() -> FilesResponse {
        FilesResponse::Store {
            files_index: FileMap::from([("index.js".to_string(), info("sha512-aDE=", 10))]),
            side_effects: None,
            package_import_method: None,
            from_store: true,
        }
    }

    fn importer(factory: Arc<dyn ImporterFactory>, method: PackageImportMethod) -> PackageImporter {
        PackageImporter::new(
            Arc::new(LocalContentStore::new("/store", None)),
            method,
            factory,
        )
    }

    fn options(files_response: FilesResponse) -> ImportPackageOptions {
        ImportPackageOptions {
            files_response,
            target_engine: None,
            requires_build: false,
            force: false,
        }
    }

    #[test]
    fn build_without_prebuilt_forces_clone_or_copy() {
        for configured in ALL_METHODS {
            for response_override in [None, Some(PackageImportMethod::Hardlink)] {
                let strategy = select_strategy(&StrategyDecision {
                    requires_build: true,
                    is_built: false,
                    response_override,
                    configured,
                });
                assert_eq!(strategy, ImportStrategy::CloneOrCopy);
            }
        }
    }

    #[test]
    fn prebuilt_variant_uses_normal_precedence() {
        let decision = StrategyDecision {
            requires_build: true,
            is_built: true,
            response_override: None,
            configured: PackageImportMethod::Hardlink,
        };
        assert_eq!(select_strategy(&decision), ImportStrategy::Hardlink);
    }

    #[test]
    fn response_override_beats_configured_default() {
        let decision = StrategyDecision {
            requires_build: false,
            is_built: false,
            response_override: Some(PackageImportMethod::Copy),
            configured: PackageImportMethod::Clone,
        };
        assert_eq!(select_strategy(&decision), ImportStrategy::Copy);
    }

    #[test]
    fn configured_default_applies_last() {
        for configured in ALL_METHODS {
            let decision = StrategyDecision {
                requires_build: false,
                is_built: false,
                response_override: None,
                configured,
            };
            assert_eq!(select_strategy(&decision), ImportStrategy::from(configured));
        }
    }

    #[tokio::test]
    async fn concurrent_first_use_constructs_once() {
        let factory = Arc::new(CountingFactory::default());
        let importer = Arc::new(importer(factory.clone(), PackageImportMethod::Hardlink));

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let importer = importer.clone();
                tokio::spawn(async move {
                    let dest = format!("/proj/node_modules/pkg-{}", i);
                    importer
                        .import_package(Path::new(&dest), options(package_p()))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
        assert_eq!(importer.strategies().len(), 1);
    }

    #[tokio::test]
    async fn distinct_strategies_construct_one_each() {
        let factory = Arc::new(CountingFactory::default());
        let importer = Arc::new(importer(factory.clone(), PackageImportMethod::Auto));
        let overrides = [
            None,
            Some(PackageImportMethod::Hardlink),
            Some(PackageImportMethod::Copy),
            Some(PackageImportMethod::Clone),
        ];

        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let importer = importer.clone();
                let package_import_method = overrides[i % overrides.len()];
                tokio::spawn(async move {
                    let response = FilesResponse::Store {
                        files_index: FileMap::new(),
                        side_effects: None,
                        package_import_method,
                        from_store: false,
                    };
                    let mut opts = options(response);
                    opts.requires_build = i % 5 == 0;
                    importer.import_package(Path::new("/proj/x"), opts).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut created = factory.strategies();
        created.sort_by_key(|s| s.to_string());
        created.dedup();
        assert_eq!(factory.calls.load(Ordering::SeqCst), 5);
        assert_eq!(created.len(), 5);
    }

    #[tokio::test]
    async fn unbuilt_package_resolves_to_store_paths() {
        let factory = Arc::new(CountingFactory::default());
        let importer = importer(factory.clone(), PackageImportMethod::Hardlink);

        let outcome = importer
            .import_package(Path::new("/proj/node_modules/p"), options(package_p()))
            .await
            .unwrap();

        assert!(!outcome.is_built);
        assert_eq!(outcome.import_method, Some(ImportMethod::Hardlink));

        let store = LocalContentStore::new("/store", None);
        let created = factory.created.lock().unwrap();
        let seen = created[0].seen.lock().unwrap();
        assert_eq!(created[0].strategy, ImportStrategy::Hardlink);
        assert!(seen[0].from_store);
        assert_eq!(
            seen[0].files_map,
            crate::import::FilesMap::from([(
                "index.js".to_string(),
                store.path_for("sha512-aDE=", 0o644)
            )])
        );
    }

    #[tokio::test]
    async fn built_variant_keeps_configured_strategy() {
        let factory = Arc::new(CountingFactory::default());
        let importer = importer(factory.clone(), PackageImportMethod::Auto);
        let response = FilesResponse::Store {
            files_index: FileMap::from([("index.js".to_string(), info("sha512-aDE=", 10))]),
            side_effects: Some(SideEffects::from([(
                "linux-x64-node-20".to_string(),
                FileMap::from([("build/addon.node".to_string(), info("sha512-aDI=", 512))]),
            )])),
            package_import_method: None,
            from_store: true,
        };
        let opts = ImportPackageOptions {
            files_response: response,
            target_engine: Some("linux-x64-node-20".to_string()),
            requires_build: true,
            force: false,
        };

        let outcome = importer.import_package(Path::new("/proj/p"), opts).await.unwrap();

        assert!(outcome.is_built);
        assert_eq!(factory.strategies(), vec![ImportStrategy::Auto]);
        let created = factory.created.lock().unwrap();
        let seen = created[0].seen.lock().unwrap();
        assert!(seen[0].files_map.contains_key("build/addon.node"));
        assert!(!seen[0].files_map.contains_key("index.js"));
    }

    #[tokio::test]
    async fn build_without_prebuilt_imports_clone_or_copy() {
        let factory = Arc::new(CountingFactory::default());
        let importer = importer(factory.clone(), PackageImportMethod::Hardlink);
        let mut opts = options(package_p());
        opts.requires_build = true;
        opts.target_engine = Some("linux-x64-node-20".to_string());

        let outcome = importer.import_package(Path::new("/proj/p"), opts).await.unwrap();

        assert!(!outcome.is_built);
        assert_eq!(factory.strategies(), vec![ImportStrategy::CloneOrCopy]);
    }

    #[tokio::test]
    async fn import_failure_propagates() {
        let importer = importer(Arc::new(FailingFactory), PackageImportMethod::Copy);

        let err = importer
            .import_package(Path::new("/proj/p"), options(package_p()))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::ImportFailed { .. }));
    }
}
