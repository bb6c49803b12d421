use crate::commands::common::Context;
use crate::error::CliError;

pub async fn run_reset(ctx: &Context, list: &str) -> Result<(), CliError> {
    let orchestrator = ctx.open_list(list)?;
    orchestrator.clear_local_state().await?;
    orchestrator.flush().await?;

    let current = orchestrator.current_list().await;
    println!(
        "Refetched {} ({} items)",
        orchestrator.list_id(),
        current.items.len()
    );
    Ok(())
}
