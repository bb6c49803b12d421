use shoplist_core::LocalItem;

use crate::commands::common::{normalize_words, parse_category, sync_or_warn, Context};
use crate::error::CliError;

pub async fn run_add(
    ctx: &Context,
    list: &str,
    name_parts: &[String],
    quantity: Option<String>,
    category: Option<&str>,
) -> Result<(), CliError> {
    let name = normalize_words(name_parts).ok_or(CliError::EmptyName)?;
    let mut local = LocalItem::new(name);
    local.quantity = quantity;
    if let Some(raw) = category {
        local = local.with_category(parse_category(raw)?);
    }

    let orchestrator = ctx.open_list(list)?;
    let item = orchestrator.create_item(local).await?;
    sync_or_warn(&orchestrator).await?;

    println!("{}", item.id);
    Ok(())
}
