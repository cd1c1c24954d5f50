//! Store maintenance commands

use super::open_store;
use crate::config::Config;
use crate::error::StoreResult;
use console::style;

/// Allocate and print a fresh temporary directory
pub async fn tmp(config: &Config) -> StoreResult<()> {
    let controller = open_store(config);
    let dir = controller.temp_dir().await?;
    controller.close().await?;

    println!("{}", dir.display());
    Ok(())
}

/// Remove unreferenced content
pub async fn prune(config: &Config) -> StoreResult<()> {
    let controller = open_store(config);
    let report = controller.prune().await?;
    controller.close().await?;

    if report.removed_files == 0 {
        println!("Nothing to prune.");
    } else {
        println!(
            "{} Removed {} files ({} bytes)",
            style("✓").green(),
            report.removed_files,
            report.removed_bytes
        );
    }
    Ok(())
}
