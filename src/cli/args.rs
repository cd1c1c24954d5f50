//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// pkgstore - content-addressed package store
///
/// Adds package directories to a shared store, imports them into projects
/// and records build outputs per engine.
#[derive(Parser, Debug)]
#[command(name = "pkgstore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PKGSTORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Store directory (overrides store.dir)
    #[arg(long, global = true, env = "PKGSTORE_STORE_DIR")]
    pub store_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a package directory to the store and write its files index
    Add(AddArgs),

    /// Import a package from its files index
    Import(ImportArgs),

    /// Import a directory outside the store as-is
    ImportLocal(ImportLocalArgs),

    /// Record a build output for an engine
    Upload(UploadArgs),

    /// Print a fresh temporary directory inside the store
    Tmp,

    /// Remove store content no project uses
    Prune,

    /// Print the engine signature of this machine
    Engine(EngineArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the add command
#[derive(Parser, Debug)]
pub struct AddArgs {
    /// Package directory
    pub dir: PathBuf,

    /// Files index to write
    #[arg(short, long)]
    pub index: PathBuf,
}

/// Arguments for the import command
#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Destination directory
    pub dest: PathBuf,

    /// Files index of the package
    #[arg(short, long)]
    pub index: PathBuf,

    /// Prefer the build recorded for this engine signature
    #[arg(short, long)]
    pub engine: Option<String>,

    /// The package will be built after import
    #[arg(long)]
    pub requires_build: bool,

    /// Re-import even if the destination already holds the package
    #[arg(short, long)]
    pub force: bool,

    /// Import method: auto, hardlink, copy or clone
    #[arg(short, long)]
    pub method: Option<String>,
}

/// Arguments for the import-local command
#[derive(Parser, Debug)]
pub struct ImportLocalArgs {
    /// Destination directory
    pub dest: PathBuf,

    /// Directory holding the package files
    #[arg(long)]
    pub from: PathBuf,

    /// Import method: auto, hardlink, copy or clone
    #[arg(short, long)]
    pub method: Option<String>,
}

/// Arguments for the upload command
#[derive(Parser, Debug)]
pub struct UploadArgs {
    /// Directory holding the build output
    pub dir: PathBuf,

    /// Files index of the built package
    #[arg(short, long)]
    pub index: PathBuf,

    /// Engine signature the output was built for
    #[arg(short, long)]
    pub engine: String,
}

/// Arguments for the engine command
#[derive(Parser, Debug)]
pub struct EngineArgs {
    /// Runtime version, e.g. 20.11.1
    #[arg(value_name = "VERSION")]
    pub runtime_version: String,

    /// Runtime name
    #[arg(long, default_value = "node")]
    pub runtime: String,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
