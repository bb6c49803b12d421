//! Authoritative server-side list state.
//!
//! Every list lives behind its own async mutex so submissions for one list
//! are merged one at a time while different lists proceed in parallel. A
//! list's snapshot is loaded lazily from the [`ListRepository`] the first time
//! it is found, and only replaced after the repository write succeeds. Unknown
//! ids never get a slot.

mod repository;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crate::error::{Error, Result};
use crate::merge::merge;
use crate::models::{CompletionItem, ListId, ShoppingList, SyncToken, SyncedShoppingList};

pub use repository::{JsonDirectoryRepository, ListRepository, MemoryListRepository};

/// Default number of buffered change notifications per subscriber.
pub const DEFAULT_NOTIFY_CAPACITY: usize = 64;

/// Emitted after every persisted mutation of a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListChange {
    pub list_id: ListId,
    pub token: SyncToken,
}

type ListSlot = Arc<Mutex<SyncedShoppingList>>;

/// Per-list authoritative state plus token issuance.
pub struct SyncStore {
    repository: Arc<dyn ListRepository>,
    slots: Mutex<HashMap<ListId, ListSlot>>,
    changes: broadcast::Sender<ListChange>,
}

impl SyncStore {
    pub fn new(repository: Arc<dyn ListRepository>, notify_capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(notify_capacity.max(1));
        Self {
            repository,
            slots: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Store backed by a fresh in-memory repository.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryListRepository::new()),
            DEFAULT_NOTIFY_CAPACITY,
        )
    }

    /// Create and persist a new, empty list.
    pub async fn create_list(&self, title: &str) -> Result<SyncedShoppingList> {
        let created = SyncedShoppingList::new(ShoppingList::new(title), SyncToken::generate());
        let mut slots = self.slots.lock().await;

        self.repository.save(&created)?;
        slots.insert(created.id(), Arc::new(Mutex::new(created.clone())));
        tracing::info!(list = %created.id(), token = %created.token, "Created list");
        Ok(created)
    }

    /// Current authoritative state of a list.
    pub async fn snapshot(&self, list_id: &ListId) -> Result<SyncedShoppingList> {
        let slot = self.slot(list_id).await?;
        let current = slot.lock().await;
        Ok(current.clone())
    }

    /// Merge a client's edits into the authoritative list.
    ///
    /// `previous_sync` may be arbitrarily stale; it only serves as the merge
    /// ancestor. A new token is issued only when the list content changes.
    pub async fn apply_and_sync(
        &self,
        list_id: &ListId,
        previous_sync: Option<&SyncedShoppingList>,
        client_state: &ShoppingList,
    ) -> Result<SyncedShoppingList> {
        validate_submission(list_id, previous_sync, client_state)?;

        let slot = self.slot(list_id).await?;
        let mut current = slot.lock().await;

        let outcome = merge(
            previous_sync.map(|synced| &synced.list),
            client_state,
            &current.list,
        );
        if outcome.merged == current.list {
            tracing::debug!(list = %list_id, token = %current.token, "Submission changed nothing");
            return Ok(current.clone());
        }

        let next = SyncedShoppingList::new(outcome.merged, SyncToken::generate());
        self.repository.save(&next)?;
        *current = next.clone();

        tracing::info!(
            list = %list_id,
            token = %next.token,
            items = next.list.items.len(),
            overridden = outcome.changed,
            "Merged client submission"
        );
        // No receivers is fine: nobody is listening for this list.
        let _ = self.changes.send(ListChange {
            list_id: *list_id,
            token: next.token.clone(),
        });
        Ok(next)
    }

    /// Item names entered across all stored lists, for autocomplete.
    pub async fn completions(&self, list_id: &ListId) -> Result<Vec<CompletionItem>> {
        self.snapshot(list_id).await?;

        let mut by_name: BTreeMap<String, CompletionItem> = BTreeMap::new();
        for id in self.repository.list_ids()? {
            let Some(stored) = self.repository.load(&id)? else {
                continue;
            };
            for item in stored.list.items {
                by_name
                    .entry(item.name.to_lowercase())
                    .or_insert(CompletionItem {
                        name: item.name,
                        category: item.category,
                    });
            }
        }
        Ok(by_name.into_values().collect())
    }

    /// Receive a [`ListChange`] for every persisted mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<ListChange> {
        self.changes.subscribe()
    }

    /// The slot of a stored list, loading it on first use.
    async fn slot(&self, list_id: &ListId) -> Result<ListSlot> {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get(list_id) {
            return Ok(slot.clone());
        }

        let loaded = self
            .repository
            .load(list_id)?
            .ok_or_else(|| Error::NotFound(format!("list {list_id}")))?;
        tracing::debug!(list = %list_id, token = %loaded.token, "Loaded list into cache");
        let slot = Arc::new(Mutex::new(loaded));
        slots.insert(*list_id, slot.clone());
        Ok(slot)
    }
}

fn validate_submission(
    list_id: &ListId,
    previous_sync: Option<&SyncedShoppingList>,
    client_state: &ShoppingList,
) -> Result<()> {
    if client_state.id != *list_id {
        return Err(Error::InvalidInput(format!(
            "submitted state belongs to list {}, not {list_id}",
            client_state.id
        )));
    }
    client_state.validate()?;

    if let Some(previous) = previous_sync {
        if previous.id() != *list_id {
            return Err(Error::InvalidInput(format!(
                "previous sync belongs to list {}, not {list_id}",
                previous.id()
            )));
        }
        previous.list.validate()?;
    }
    Ok(())
}
