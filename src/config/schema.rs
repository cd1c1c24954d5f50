//! Configuration schema for pkgstore
//!
//! Configuration is stored at `~/.config/pkgstore/config.toml`

use crate::import::PackageImportMethod;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Store controller settings
    pub store: StoreConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Store controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store root; content lives in `files/`, scratch space in `tmp/`
    pub dir: PathBuf,

    /// Default materialization strategy
    pub package_import_method: PackageImportMethod,

    /// Allow overwriting non-empty destinations
    pub force: bool,

    /// Re-verify store content on fetch (passed to the requester)
    pub verify_store_integrity: bool,

    /// Maximum concurrent network requests (passed to the requester)
    pub network_concurrency: u32,

    /// File names never added to the store
    pub ignore_files: Vec<String>,

    /// Rebuild an unreadable files index instead of failing the upload
    pub recover_corrupt_index: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            package_import_method: PackageImportMethod::Auto,
            force: false,
            verify_store_integrity: true,
            network_concurrency: 16,
            ignore_files: vec![],
            recover_corrupt_index: false,
        }
    }
}

impl StoreConfig {
    /// Compile `ignore_files` into the predicate used during ingestion
    pub fn ignore_file(&self) -> Option<IgnoreFile> {
        if self.ignore_files.is_empty() {
            return None;
        }
        let names = self.ignore_files.clone();
        Some(Arc::new(move |name: &str| names.iter().any(|n| n == name)))
    }
}

/// Predicate over file names excluded from store ingestion
pub type IgnoreFile = Arc<dyn Fn(&str) -> bool + Send + Sync>;

fn default_store_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pkgstore")
        .join("store")
        .join("v3")
}
