//! Files response resolution

use super::{FilesMap, PackageImportMethod};
use crate::cafs::ContentStore;
use crate::files_index::{FileMap, SideEffects};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A package's files, as produced by the requester
#[derive(Debug, Clone, PartialEq)]
pub enum FilesResponse {
    /// Files already on disk outside the store, used in place
    Local {
        files_index: BTreeMap<String, PathBuf>,
        package_import_method: Option<PackageImportMethod>,
    },
    /// Content-addressed files, possibly with built variants per engine
    Store {
        files_index: FileMap,
        side_effects: Option<SideEffects>,
        package_import_method: Option<PackageImportMethod>,
        /// The package was already in the store before this request
        from_store: bool,
    },
}

impl FilesResponse {
    /// Whether the files were already present in the store
    pub fn from_store(&self) -> bool {
        match self {
            Self::Local { .. } => false,
            Self::Store { from_store, .. } => *from_store,
        }
    }

    /// Strategy override carried by the response itself
    pub fn package_import_method(&self) -> Option<PackageImportMethod> {
        match self {
            Self::Local {
                package_import_method,
                ..
            }
            | Self::Store {
                package_import_method,
                ..
            } => *package_import_method,
        }
    }
}

/// Concrete files to place, and whether they are a prebuilt variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFiles {
    pub files_map: FilesMap,
    pub is_built: bool,
}

/// Resolve a files response into absolute source paths.
///
/// Local files are used verbatim. Store files come from the target engine's
/// built variant when one was recorded, otherwise from the unbuilt listing;
/// a missing variant is a normal fallback.
pub fn resolve_file_map(
    store: &dyn ContentStore,
    files_response: FilesResponse,
    target_engine: Option<&str>,
) -> ResolvedFiles {
    match files_response {
        FilesResponse::Local { files_index, .. } => ResolvedFiles {
            files_map: files_index,
            is_built: false,
        },
        FilesResponse::Store {
            files_index,
            side_effects,
            ..
        } => {
            let built = target_engine
                .zip(side_effects)
                .and_then(|(engine, mut side_effects)| side_effects.remove(engine));

            let (listing, is_built) = match built {
                Some(listing) => (listing, true),
                None => (files_index, false),
            };

            let files_map = listing
                .into_iter()
                .map(|(name, info)| {
                    let path = store.path_for(&info.integrity, info.mode);
                    (name, path)
                })
                .collect();

            ResolvedFiles {
                files_map,
                is_built,
            }
        }
    }
}
