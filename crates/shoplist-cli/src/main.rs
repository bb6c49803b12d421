//! shoplist CLI - Command-line client for shared shopping lists
//!
//! Every command works against local state first and syncs with the server
//! when it can be reached.

mod cli;
mod commands;
mod error;


use clap::Parser;
use shoplist_core::config::SyncConfig;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::{parse_category, resolve_state_path, Context, ItemChanges};
use crate::commands::completions::run_completions;
use crate::commands::create_list::run_create_list;
use crate::commands::delete::run_delete;
use crate::commands::recent::run_recent;
use crate::commands::rename::run_rename;
use crate::commands::reset::run_reset;
use crate::commands::show::run_show;
use crate::commands::suggest::run_suggest;
use crate::commands::sync::run_sync;
use crate::commands::update::run_update;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shoplist=info".parse().expect("valid directive"))
                .add_directive("shoplist_core=warn".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let mut config = SyncConfig::from_env()?;
    if let Some(server) = cli.server {
        config = config.with_server_url(server)?;
    }
    let ctx = Context {
        config,
        state_path: resolve_state_path(cli.state_path),
    };

    match cli.command {
        Commands::CreateList { title, json } => run_create_list(&ctx, &title, json).await?,
        Commands::Show { list, json } => run_show(&ctx, &list, json).await?,
        Commands::Add {
            list,
            name,
            quantity,
            category,
        } => run_add(&ctx, &list, &name, quantity, category.as_deref()).await?,
        Commands::Update {
            list,
            item,
            name,
            quantity,
            clear_quantity,
            category,
            clear_category,
        } => {
            let changes = ItemChanges {
                name,
                quantity,
                clear_quantity,
                category: category.as_deref().map(parse_category).transpose()?,
                clear_category,
            };
            run_update(&ctx, &list, &item, changes).await?;
        }
        Commands::Delete { list, item } => run_delete(&ctx, &list, &item).await?,
        Commands::Rename { list, title } => run_rename(&ctx, &list, &title).await?,
        Commands::Recent { list, json } => run_recent(&ctx, &list, json).await?,
        Commands::Suggest { list, prefix } => {
            run_suggest(&ctx, &list, prefix.as_deref()).await?;
        }
        Commands::Sync { list } => run_sync(&ctx, &list).await?,
        Commands::Watch { list } => run_watch(&ctx, &list).await?,
        Commands::Reset { list } => run_reset(&ctx, &list).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
