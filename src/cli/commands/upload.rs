//! Upload command - record a build output

use super::open_store;
use crate::cli::args::UploadArgs;
use crate::config::Config;
use crate::error::StoreResult;
use crate::side_effects::UploadOptions;
use console::style;

/// Execute the upload command
pub async fn execute(args: UploadArgs, config: &Config) -> StoreResult<()> {
    let controller = open_store(config);

    controller
        .upload(
            &args.dir,
            &UploadOptions {
                files_index_file: args.index.clone(),
                engine: args.engine.clone(),
            },
        )
        .await?;
    controller.close().await?;

    println!(
        "{} Recorded build for {} in {}",
        style("✓").green(),
        style(&args.engine).cyan(),
        args.index.display()
    );
    Ok(())
}
