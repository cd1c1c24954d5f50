//! Engine command - print this machine's engine signature

use crate::cli::args::EngineArgs;
use crate::engine;
use crate::error::StoreResult;

/// Execute the engine command
pub async fn execute(args: EngineArgs) -> StoreResult<()> {
    println!("{}", engine::current(&args.runtime, &args.runtime_version));
    Ok(())
}
