//! Package materialization
//!
//! Turns a package's files response into files on disk:
//!
//! 1. [`resolve_file_map`] picks the unbuilt listing or the engine's built
//!    variant and maps every entry to its content path.
//! 2. [`select_strategy`] decides how files are placed.
//! 3. A cached [`Importer`] for that strategy writes the destination.

mod fs;
mod importers;
mod resolve;
mod strategy;

pub use importers::FsImporterFactory;
pub use resolve::{resolve_file_map, FilesResponse, ResolvedFiles};
pub use strategy::{
    select_strategy, ImporterFactory, PackageImporter, StrategyCache, StrategyDecision,
};

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Relative file name to absolute source path
pub type FilesMap = BTreeMap<String, PathBuf>;

/// Configurable default materialization strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageImportMethod {
    /// Probe clone, then hardlink, then copy
    #[default]
    Auto,
    Hardlink,
    Copy,
    Clone,
}

impl fmt::Display for PackageImportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ImportStrategy::from(*self).fmt(f)
    }
}

impl FromStr for PackageImportMethod {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "hardlink" => Ok(Self::Hardlink),
            "copy" => Ok(Self::Copy),
            "clone" => Ok(Self::Clone),
            other => Err(StoreError::UnknownImportMethod(other.to_string())),
        }
    }
}

/// Strategy an importer is built for; the key of the strategy cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportStrategy {
    Auto,
    Hardlink,
    Copy,
    Clone,
    /// Clone when the filesystem supports it, otherwise copy. Always yields
    /// files that can be written without touching the store.
    CloneOrCopy,
}

impl From<PackageImportMethod> for ImportStrategy {
    fn from(method: PackageImportMethod) -> Self {
        match method {
            PackageImportMethod::Auto => Self::Auto,
            PackageImportMethod::Hardlink => Self::Hardlink,
            PackageImportMethod::Copy => Self::Copy,
            PackageImportMethod::Clone => Self::Clone,
        }
    }
}

impl fmt::Display for ImportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Hardlink => "hardlink",
            Self::Copy => "copy",
            Self::Clone => "clone",
            Self::CloneOrCopy => "clone-or-copy",
        };
        write!(f, "{}", name)
    }
}

/// Method that actually placed the files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMethod {
    Hardlink,
    Copy,
    Clone,
}

impl fmt::Display for ImportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hardlink => "hardlink",
            Self::Copy => "copy",
            Self::Clone => "clone",
        };
        write!(f, "{}", name)
    }
}

/// Input handed to an importer for one package
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Files to place, by relative name
    pub files_map: FilesMap,
    /// Whether the files come from the content store
    pub from_store: bool,
    /// Re-import even if the destination already holds the package
    pub force: bool,
}

/// Places a package's files at a destination using one strategy
#[async_trait]
pub trait Importer: Send + Sync {
    /// Materialize `request.files_map` at `dest`.
    ///
    /// Returns the method used, or `None` when the destination already held
    /// the package and nothing was written.
    async fn import(&self, dest: &Path, request: &ImportRequest)
        -> StoreResult<Option<ImportMethod>>;
}

/// Options for importing one package
#[derive(Debug, Clone)]
pub struct ImportPackageOptions {
    pub files_response: FilesResponse,
    /// Engine signature whose built variant should be preferred
    pub target_engine: Option<String>,
    /// The package runs a build step after import
    pub requires_build: bool,
    pub force: bool,
}

/// Result of importing one package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Method actually used; `None` if the import was skipped
    pub import_method: Option<ImportMethod>,
    /// Whether a prebuilt variant was imported
    pub is_built: bool,
}
