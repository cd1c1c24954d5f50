//! Add command - ingest a package directory

use super::open_store;
use crate::cli::args::AddArgs;
use crate::config::Config;
use crate::error::StoreResult;
use console::style;

/// Execute the add command
pub async fn execute(args: AddArgs, config: &Config) -> StoreResult<()> {
    let controller = open_store(config);

    let index = controller.add_files_from_dir(&args.dir).await?;
    controller.write_files_index(&args.index, &index).await?;
    controller.close().await?;

    println!(
        "{} Added {} files from {}",
        style("✓").green(),
        index.files.len(),
        args.dir.display()
    );
    println!("  {} {}", style("index").dim(), args.index.display());
    Ok(())
}
