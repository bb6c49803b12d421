use crate::commands::common::{normalize_words, sync_or_warn, Context};
use crate::error::CliError;

pub async fn run_rename(ctx: &Context, list: &str, title_parts: &[String]) -> Result<(), CliError> {
    let title = normalize_words(title_parts).ok_or(CliError::EmptyTitle)?;

    let orchestrator = ctx.open_list(list)?;
    orchestrator.update_title(&title).await?;
    sync_or_warn(&orchestrator).await?;

    println!("{title}");
    Ok(())
}
