use crate::commands::common::{resolve_item, sync_or_warn, Context};
use crate::error::CliError;

pub async fn run_delete(ctx: &Context, list: &str, item: &str) -> Result<(), CliError> {
    let orchestrator = ctx.open_list(list)?;
    let current = orchestrator.current_list().await;
    let item_id = resolve_item(item, &current)?.id;

    let removed = orchestrator.delete_item(&item_id).await?;
    sync_or_warn(&orchestrator).await?;

    println!("{}", removed.id);
    Ok(())
}
