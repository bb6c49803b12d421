use crate::commands::common::{
    format_item_lines, format_sync_summary, item_to_list_entry, sync_or_warn, Context,
    ItemListEntry,
};
use crate::error::CliError;

pub async fn run_show(ctx: &Context, list: &str, as_json: bool) -> Result<(), CliError> {
    let orchestrator = ctx.open_list(list)?;
    sync_or_warn(&orchestrator).await?;
    let state = orchestrator.state().await;
    let current = &state.current_local;

    if as_json {
        let items = current
            .items
            .iter()
            .map(item_to_list_entry)
            .collect::<Vec<ItemListEntry>>();
        let payload = serde_json::json!({
            "id": current.id,
            "title": current.title,
            "items": items,
            "dirty": state.dirty,
            "lastSyncedAt": state.last_synced_at,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let title = if current.title.is_empty() {
        "(untitled)"
    } else {
        current.title.as_str()
    };
    println!("{title}  [{}]", format_sync_summary(state.last_synced_at, state.dirty));
    if current.items.is_empty() {
        println!("No items.");
    }
    for line in format_item_lines(current) {
        println!("{line}");
    }
    Ok(())
}
