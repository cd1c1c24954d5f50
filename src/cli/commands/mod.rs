//! CLI command implementations

pub mod add;
pub mod config;
pub mod engine;
pub mod import;
pub mod store;
pub mod upload;

pub use add::execute as add;
pub use config::execute as config;
pub use engine::execute as engine;
pub use import::{execute as import, execute_local as import_local};
pub use store::{prune, tmp};
pub use upload::execute as upload;

use crate::config::Config;
use crate::controller::StoreController;

/// Controller for the configured store; the CLI has no package requester
fn open_store(config: &Config) -> StoreController {
    StoreController::builder(config.store.clone()).build()
}
