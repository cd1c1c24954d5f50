//! Package requester interface
//!
//! Resolution and fetching live outside this crate. The controller hands the
//! requester its content store so fetched bytes land directly in the store.

use crate::cafs::ContentStore;
use crate::config::IgnoreFile;
use crate::error::StoreResult;
use crate::import::FilesResponse;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a requester is built with
#[derive(Clone)]
pub struct RequesterContext {
    /// Store fetched files are written into
    pub store: Arc<dyn ContentStore>,
    pub store_dir: PathBuf,
    pub force: bool,
    /// Re-hash store content before trusting it
    pub verify_store_integrity: bool,
    pub network_concurrency: u32,
    pub ignore_file: Option<IgnoreFile>,
}

/// A dependency as written in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WantedDependency {
    pub alias: Option<String>,
    /// Version range, tag, URL or path
    pub pref: String,
}

/// Options for resolving and fetching one dependency
#[derive(Debug, Clone, Default)]
pub struct RequestPackageOptions {
    pub project_dir: PathBuf,
    pub lockfile_dir: PathBuf,
    /// Package id already recorded in the lockfile, if any
    pub current_package_id: Option<String>,
    pub prefer_offline: bool,
    /// Resolve only
    pub skip_fetch: bool,
}

/// Options for fetching an already resolved package
#[derive(Debug, Clone)]
pub struct FetchPackageOptions {
    pub package_id: String,
    /// Requester-specific resolution record
    pub resolution: serde_json::Value,
    pub lockfile_dir: PathBuf,
    pub force: bool,
}

/// A package whose files are in the store
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Files index the package's side effects are recorded in
    pub files_index_file: PathBuf,
    pub files: FilesResponse,
}

/// Result of requesting a dependency
#[derive(Debug, Clone)]
pub struct PackageResponse {
    pub id: String,
    pub resolution: serde_json::Value,
    /// Parsed manifest when the requester had it at hand
    pub manifest: Option<serde_json::Value>,
    /// Absent when fetching was skipped
    pub fetch: Option<FetchResponse>,
    /// The resolution differs from the one in the lockfile
    pub updated: bool,
}

/// Resolves and fetches packages into the store
#[async_trait]
pub trait PackageRequester: Send + Sync {
    async fn request_package(
        &self,
        wanted: &WantedDependency,
        opts: &RequestPackageOptions,
    ) -> StoreResult<PackageResponse>;

    async fn fetch_package_to_store(&self, opts: &FetchPackageOptions)
        -> StoreResult<FetchResponse>;
}

/// Builds the requester once the controller's store exists
pub type RequesterFactory =
    Box<dyn FnOnce(RequesterContext) -> Arc<dyn PackageRequester> + Send>;
