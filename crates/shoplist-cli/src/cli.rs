use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "shoplist")]
#[command(about = "Shared shopping lists that keep working offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sync server base URL (overrides SHOPLIST_SERVER_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Optional path to the local state file
    #[arg(long, global = true, value_name = "PATH")]
    pub state_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new list on the server
    CreateList {
        /// List title
        title: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sync and print a list
    #[command(alias = "ls")]
    Show {
        /// List ID or unique ID prefix
        list: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an item to a list
    #[command(alias = "new")]
    Add {
        /// List ID or unique ID prefix
        list: String,
        /// Item name
        name: Vec<String>,
        /// Free-form quantity, e.g. "2" or "500g"
        #[arg(short, long)]
        quantity: Option<String>,
        /// Category ID
        #[arg(long, value_name = "ID")]
        category: Option<String>,
    },
    /// Change an existing item
    Update {
        /// List ID or unique ID prefix
        list: String,
        /// Item ID or unique ID prefix
        item: String,
        /// New item name
        #[arg(long)]
        name: Option<String>,
        /// New quantity
        #[arg(short, long, conflicts_with = "clear_quantity")]
        quantity: Option<String>,
        /// Remove the quantity
        #[arg(long)]
        clear_quantity: bool,
        /// New category ID
        #[arg(long, value_name = "ID", conflicts_with = "clear_category")]
        category: Option<String>,
        /// Remove the category
        #[arg(long)]
        clear_category: bool,
    },
    /// Delete an item
    #[command(alias = "rm")]
    Delete {
        /// List ID or unique ID prefix
        list: String,
        /// Item ID or unique ID prefix
        item: String,
    },
    /// Rename a list
    Rename {
        /// List ID or unique ID prefix
        list: String,
        /// New title
        title: Vec<String>,
    },
    /// Show recently deleted items, newest first
    Recent {
        /// List ID or unique ID prefix
        list: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest item names entered on any list
    Suggest {
        /// List ID or unique ID prefix
        list: String,
        /// Only names starting with this text
        prefix: Option<String>,
    },
    /// Sync a list with the server now
    Sync {
        /// List ID or unique ID prefix
        list: String,
    },
    /// Stay connected and print changes as they arrive
    Watch {
        /// List ID or unique ID prefix
        list: String,
    },
    /// Drop local state for a list and refetch it
    Reset {
        /// List ID or unique ID prefix
        list: String,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
