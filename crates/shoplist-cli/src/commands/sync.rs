use shoplist_core::sync::SyncOutcome;

use crate::commands::common::Context;
use crate::error::CliError;

pub async fn run_sync(ctx: &Context, list: &str) -> Result<(), CliError> {
    let orchestrator = ctx.open_list(list)?;

    match orchestrator.flush().await? {
        SyncOutcome::Completed { rounds, dirty: false } => {
            println!("Sync completed in {rounds} round(s)");
        }
        SyncOutcome::Completed { rounds, dirty: true } => {
            println!("Sync stopped after {rounds} rounds with changes still pending");
        }
        SyncOutcome::Skipped => println!("Sync already in progress"),
    }
    Ok(())
}
