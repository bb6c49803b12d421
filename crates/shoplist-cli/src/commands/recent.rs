use shoplist_core::models::RecentlyDeleted;

use crate::commands::common::Context;
use crate::error::CliError;

pub async fn run_recent(ctx: &Context, list: &str, as_json: bool) -> Result<(), CliError> {
    let orchestrator = ctx.open_list(list)?;
    let state = orchestrator.state().await;
    let recent = newest_first(&state.recently_deleted);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&recent)?);
    } else if recent.is_empty() {
        println!("No recently deleted items.");
    } else {
        for fingerprint in recent {
            println!("{fingerprint}");
        }
    }
    Ok(())
}

pub fn newest_first(recently_deleted: &RecentlyDeleted) -> Vec<String> {
    recently_deleted.iter().rev().map(str::to_string).collect()
}
