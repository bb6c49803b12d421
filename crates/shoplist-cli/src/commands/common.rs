use std::env;
use std::fmt::Display;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use shoplist_core::config::SyncConfig;
use shoplist_core::models::CategoryId;
use shoplist_core::sync::{HttpSyncClient, JsonClientStore, SyncOrchestrator, SyncOutcome};
use shoplist_core::{Item, ItemId, ListId, LocalItem, ShoppingList};

use crate::error::CliError;

pub type ListOrchestrator = SyncOrchestrator<HttpSyncClient, JsonClientStore>;

/// Settings shared by every command.
pub struct Context {
    pub config: SyncConfig,
    pub state_path: PathBuf,
}

impl Context {
    pub fn client_store(&self) -> JsonClientStore {
        JsonClientStore::new(&self.state_path)
    }

    pub fn http_client(&self) -> Result<HttpSyncClient, CliError> {
        Ok(HttpSyncClient::new(&self.config)?)
    }

    /// Open the orchestrator for the list named by `list_query`.
    pub fn open_list(&self, list_query: &str) -> Result<ListOrchestrator, CliError> {
        let store = self.client_store();
        let known = store.list_ids()?;
        let list_id = resolve_list_id(list_query, &known)?;
        Ok(SyncOrchestrator::open(
            list_id,
            self.config.clone(),
            self.http_client()?,
            store,
        )?)
    }
}

/// Sync now; network trouble only warns since edits are already saved.
pub async fn sync_or_warn(orchestrator: &ListOrchestrator) -> Result<(), CliError> {
    match orchestrator.flush().await {
        Ok(SyncOutcome::Completed { dirty: true, rounds }) => {
            eprintln!("Warning: list still has unsynced changes after {rounds} rounds");
        }
        Ok(_) => {}
        Err(error) if error.is_network_failure() => {
            eprintln!("Warning: saved locally; sync failed: {error}");
        }
        Err(error) => return Err(error.into()),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ItemListEntry {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

pub fn item_to_list_entry(item: &Item) -> ItemListEntry {
    ItemListEntry {
        id: item.id.to_string(),
        name: item.name.clone(),
        quantity: item.quantity.clone(),
        category: item.category.map(|category| category.to_string()),
    }
}

pub fn format_item_lines(list: &ShoppingList) -> Vec<String> {
    list.items
        .iter()
        .map(|item| {
            let short_id = short_id(&item.id);
            match item.quantity.as_deref() {
                Some(quantity) => format!("{short_id:<13}  {:<30}  {quantity}", item.name),
                None => format!("{short_id:<13}  {}", item.name),
            }
        })
        .collect()
}

pub fn format_sync_summary(last_synced_at: Option<i64>, dirty: bool) -> String {
    let synced = last_synced_at.map_or_else(
        || "never synced".to_string(),
        |timestamp| format!("synced {}", format_relative_time(timestamp, Utc::now().timestamp_millis())),
    );
    if dirty {
        format!("{synced}, local changes pending")
    } else {
        synced
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

pub fn short_id(id: &impl Display) -> String {
    id.to_string().chars().take(13).collect()
}

pub fn normalize_words(parts: &[String]) -> Option<String> {
    let joined = parts.join(" ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_identifier(id: &str, kind: &'static str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyId(kind));
    }
    Ok(trimmed.to_lowercase())
}

pub fn parse_category(raw: &str) -> Result<CategoryId, CliError> {
    raw.parse::<CategoryId>()
        .map_err(|_| CliError::InvalidCategory(raw.trim().to_string()))
}

/// Find the single candidate whose id starts with `query`.
fn resolve_prefix<T: Copy + Display>(query: &str, candidates: &[T]) -> Result<Option<T>, CliError> {
    let matches = candidates
        .iter()
        .filter(|candidate| candidate.to_string().starts_with(query))
        .copied()
        .collect::<Vec<_>>();

    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0])),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(short_id)
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// A full list id is taken as-is, so lists never opened here can be fetched.
pub fn resolve_list_id(list_query: &str, known: &[ListId]) -> Result<ListId, CliError> {
    let query = normalize_identifier(list_query, "List")?;
    if let Ok(list_id) = query.parse::<ListId>() {
        return Ok(list_id);
    }
    resolve_prefix(&query, known)?.ok_or(CliError::ListNotFound(query))
}

pub fn resolve_item<'a>(item_query: &str, list: &'a ShoppingList) -> Result<&'a Item, CliError> {
    let query = normalize_identifier(item_query, "Item")?;
    if let Some(item) = query.parse::<ItemId>().ok().and_then(|id| list.get(&id)) {
        return Ok(item);
    }

    let ids = list.items.iter().map(|item| item.id).collect::<Vec<_>>();
    resolve_prefix(&query, &ids)?
        .and_then(|id| list.get(&id))
        .ok_or(CliError::ItemNotFound(query))
}

/// Requested field changes for `update`.
#[derive(Debug, Default)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub clear_quantity: bool,
    pub category: Option<CategoryId>,
    pub clear_category: bool,
}

impl ItemChanges {
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.quantity.is_none()
            && !self.clear_quantity
            && self.category.is_none()
            && !self.clear_category
    }

    pub fn apply_to(self, item: &Item) -> Result<LocalItem, CliError> {
        if self.is_empty() {
            return Err(CliError::NothingToUpdate);
        }
        let mut local = item.to_local();
        if let Some(name) = self.name {
            local.name = name;
        }
        if self.clear_quantity {
            local.quantity = None;
        } else if let Some(quantity) = self.quantity {
            local.quantity = Some(quantity);
        }
        if self.clear_category {
            local.category = None;
        } else if let Some(category) = self.category {
            local.category = Some(category);
        }
        Ok(local)
    }
}

pub fn resolve_state_path(cli_state_path: Option<PathBuf>) -> PathBuf {
    cli_state_path
        .or_else(|| env::var_os("SHOPLIST_STATE_PATH").map(PathBuf::from))
        .unwrap_or_else(default_state_path)
}

pub fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shoplist")
        .join("state.json")
}
