use crate::commands::common::{resolve_item, sync_or_warn, Context, ItemChanges};
use crate::error::CliError;

pub async fn run_update(
    ctx: &Context,
    list: &str,
    item: &str,
    changes: ItemChanges,
) -> Result<(), CliError> {
    if changes.is_empty() {
        return Err(CliError::NothingToUpdate);
    }

    let orchestrator = ctx.open_list(list)?;
    let current = orchestrator.current_list().await;
    let existing = resolve_item(item, &current)?;
    let local = changes.apply_to(existing)?;

    let updated = orchestrator.update_item(&existing.id, local).await?;
    sync_or_warn(&orchestrator).await?;

    println!("{}", updated.id);
    Ok(())
}
