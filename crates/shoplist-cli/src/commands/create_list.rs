use crate::commands::common::{normalize_words, sync_or_warn, Context};
use crate::error::CliError;

pub async fn run_create_list(
    ctx: &Context,
    title_parts: &[String],
    as_json: bool,
) -> Result<(), CliError> {
    let title = normalize_words(title_parts).ok_or(CliError::EmptyTitle)?;
    let created = ctx.http_client()?.create_list(&title).await?;
    tracing::info!(list = %created.id(), "Created list");

    let orchestrator = ctx.open_list(&created.id().to_string())?;
    sync_or_warn(&orchestrator).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        println!("{}", created.id());
    }
    Ok(())
}
