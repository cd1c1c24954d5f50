//! pkgstore CLI entry point
//!
//! Loads configuration, sets up logging and dispatches to subcommands.

use clap::Parser;
use console::style;
use pkgstore::cli::{Cli, Commands};
use pkgstore::config::ConfigManager;
use pkgstore::error::StoreResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> StoreResult<()> {
    let cli = Cli::parse();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let mut config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let verbosity = cli.verbose.max(u8::from(config.general.verbose));
    let filter = match verbosity {
        0 => EnvFilter::new("pkgstore=warn"),
        1 => EnvFilter::new("pkgstore=info"),
        _ => EnvFilter::new("pkgstore=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }

    if let Some(dir) = cli.store_dir {
        debug!("Store directory overridden: {}", dir.display());
        config.store.dir = dir;
    }

    match cli.command {
        Commands::Add(args) => pkgstore::cli::commands::add(args, &config).await,
        Commands::Import(args) => pkgstore::cli::commands::import(args, &config).await,
        Commands::ImportLocal(args) => pkgstore::cli::commands::import_local(args, &config).await,
        Commands::Upload(args) => pkgstore::cli::commands::upload(args, &config).await,
        Commands::Tmp => pkgstore::cli::commands::tmp(&config).await,
        Commands::Prune => pkgstore::cli::commands::prune(&config).await,
        Commands::Engine(args) => pkgstore::cli::commands::engine(args).await,
        Commands::Config(args) => {
            pkgstore::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
