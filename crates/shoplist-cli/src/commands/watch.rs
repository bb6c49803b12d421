use shoplist_core::sync::WebSocketChannel;
use shoplist_core::{ConnectionState, SyncToken};

use crate::commands::common::{format_item_lines, Context};
use crate::error::CliError;

/// Keep the list connected until Ctrl-C, printing every change.
pub async fn run_watch(ctx: &Context, list: &str) -> Result<(), CliError> {
    let orchestrator = ctx.open_list(list)?;
    let channel = WebSocketChannel::new(&ctx.config)?;
    let probe = ctx.http_client()?;
    let mut status = orchestrator.subscribe_status();

    orchestrator.start(channel, probe);
    println!("Watching {} (Ctrl-C to stop)", orchestrator.list_id());

    let mut shown_token: Option<SyncToken> = None;
    let mut shown_connection: Option<ConnectionState> = None;
    let mut shown_failure = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();

                if shown_connection != Some(current.connection) {
                    println!("-- {}", current.connection.label());
                    shown_connection = Some(current.connection);
                }
                if current.last_sync_failed && !shown_failure {
                    let reason = current.last_error.as_deref().unwrap_or("unknown error");
                    println!("-- sync failed: {reason}");
                }
                shown_failure = current.last_sync_failed;

                let state = orchestrator.state().await;
                let token = state.previous_sync.as_ref().map(|synced| synced.token.clone());
                if token.is_some() && token != shown_token {
                    println!("== {} ({} items)", state.current_local.title, state.current_local.items.len());
                    for line in format_item_lines(&state.current_local) {
                        println!("{line}");
                    }
                    shown_token = token;
                }
            }
        }
    }

    orchestrator.shutdown();
    Ok(())
}
