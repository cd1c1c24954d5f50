//! pkgstore - content-addressed package store controller
//!
//! Keeps every package file once in a shared store, materializes packages
//! into projects by hard link, copy or copy-on-write clone, and records the
//! outputs of package builds per engine so later installs can reuse them.

pub mod cafs;
pub mod cli;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod files_index;
pub mod import;
pub mod side_effects;

pub use controller::StoreController;
pub use error::{StoreError, StoreResult};
