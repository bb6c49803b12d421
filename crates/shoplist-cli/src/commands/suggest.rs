use shoplist_core::CompletionItem;

use crate::commands::common::{sync_or_warn, Context};
use crate::error::CliError;

pub async fn run_suggest(ctx: &Context, list: &str, prefix: Option<&str>) -> Result<(), CliError> {
    let orchestrator = ctx.open_list(list)?;
    sync_or_warn(&orchestrator).await?;

    for completion in filter_completions(orchestrator.completions().await, prefix) {
        println!("{}", completion.name);
    }
    Ok(())
}

pub fn filter_completions(
    completions: Vec<CompletionItem>,
    prefix: Option<&str>,
) -> Vec<CompletionItem> {
    let Some(prefix) = prefix.map(|prefix| prefix.trim().to_lowercase()) else {
        return completions;
    };
    completions
        .into_iter()
        .filter(|completion| completion.name.to_lowercase().starts_with(&prefix))
        .collect()
}
