//! Import commands - materialize a package into a destination

use super::open_store;
use crate::cafs::walk;
use crate::cli::args::{ImportArgs, ImportLocalArgs};
use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::files_index;
use crate::import::{FilesResponse, ImportOutcome, ImportPackageOptions, PackageImportMethod};
use console::style;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Execute the import command
pub async fn execute(args: ImportArgs, config: &Config) -> StoreResult<()> {
    let method = parse_method(args.method.as_deref())?;
    let index = files_index::read(&args.index)
        .await?
        .ok_or_else(|| StoreError::PathNotFound(args.index.clone()))?;

    let controller = open_store(config);
    let outcome = controller
        .import_package(
            &args.dest,
            ImportPackageOptions {
                files_response: FilesResponse::Store {
                    files_index: index.files,
                    side_effects: index.side_effects,
                    package_import_method: method,
                    from_store: true,
                },
                target_engine: args.engine,
                requires_build: args.requires_build,
                force: args.force,
            },
        )
        .await?;
    controller.close().await?;

    report(&args.dest, outcome);
    Ok(())
}

/// Execute the import-local command
pub async fn execute_local(args: ImportLocalArgs, config: &Config) -> StoreResult<()> {
    let method = parse_method(args.method.as_deref())?;
    let files = local_files(&args.from).await?;

    let controller = open_store(config);
    let outcome = controller
        .import_package(
            &args.dest,
            ImportPackageOptions {
                files_response: FilesResponse::Local {
                    files_index: files,
                    package_import_method: method,
                },
                target_engine: None,
                requires_build: false,
                force: false,
            },
        )
        .await?;
    controller.close().await?;

    report(&args.dest, outcome);
    Ok(())
}

fn parse_method(method: Option<&str>) -> StoreResult<Option<PackageImportMethod>> {
    method.map(str::parse).transpose()
}

fn report(dest: &Path, outcome: ImportOutcome) {
    match outcome.import_method {
        Some(method) => {
            let built = if outcome.is_built { ", prebuilt" } else { "" };
            println!(
                "{} Imported {} ({}{})",
                style("✓").green(),
                dest.display(),
                method,
                built
            );
        }
        None => println!(
            "{} {} is already up to date",
            style("-").dim(),
            dest.display()
        ),
    }
}

/// Regular files under `dir`, keyed by `/`-separated relative name
async fn local_files(dir: &Path) -> StoreResult<BTreeMap<String, PathBuf>> {
    let files = walk::regular_files(dir, None)
        .await
        .map_err(|e| StoreError::io(format!("reading {}", dir.display()), e))?;
    Ok(files.into_iter().map(|f| (f.relative, f.path)).collect())
}
