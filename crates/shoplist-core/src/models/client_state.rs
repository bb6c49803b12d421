//! Client-side sync state model

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::list::{ListId, ShoppingList, SyncedShoppingList};

/// Maximum number of fingerprints kept in [`RecentlyDeleted`].
pub const RECENTLY_DELETED_CAPACITY: usize = 10;

/// Fingerprints of items the user deleted, most recent last.
///
/// Deduplicated and bounded to [`RECENTLY_DELETED_CAPACITY`]; the oldest entry
/// is evicted first. Suggestion UIs use it; the merge never consults it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct RecentlyDeleted {
    entries: VecDeque<String>,
}

impl RecentlyDeleted {
    /// Record a deletion, moving an existing identical fingerprint to the end.
    pub fn push(&mut self, fingerprint: impl Into<String>) {
        let fingerprint = fingerprint.into();
        self.entries.retain(|entry| *entry != fingerprint);
        self.entries.push_back(fingerprint);
        while self.entries.len() > RECENTLY_DELETED_CAPACITY {
            self.entries.pop_front();
        }
    }

    /// Drop a fingerprint, e.g. when the user re-adds that item.
    pub fn forget(&mut self, fingerprint: &str) {
        self.entries.retain(|entry| entry != fingerprint);
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<String>> for RecentlyDeleted {
    fn from(entries: Vec<String>) -> Self {
        let mut recently_deleted = Self::default();
        for entry in entries {
            recently_deleted.push(entry);
        }
        recently_deleted
    }
}

impl From<RecentlyDeleted> for Vec<String> {
    fn from(value: RecentlyDeleted) -> Self {
        value.entries.into()
    }
}

/// Everything a client keeps about one list between sync round trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSyncState {
    /// Last server snapshot this client fully reconciled against.
    #[serde(default)]
    pub previous_sync: Option<SyncedShoppingList>,
    pub current_local: ShoppingList,
    /// Local state differs from the last state confirmed in sync.
    #[serde(default)]
    pub dirty: bool,
    #[serde(default)]
    pub recently_deleted: RecentlyDeleted,
    /// Unix ms of the last successful sync.
    #[serde(default)]
    pub last_synced_at: Option<i64>,
}

impl ClientSyncState {
    /// Fresh state for a list this client has never synced.
    #[must_use]
    pub fn new(list_id: ListId) -> Self {
        Self {
            previous_sync: None,
            current_local: ShoppingList::empty(list_id),
            dirty: false,
            recently_deleted: RecentlyDeleted::default(),
            last_synced_at: None,
        }
    }

    pub const fn list_id(&self) -> ListId {
        self.current_local.id
    }

    /// Replace the local list with an edited snapshot and mark it dirty.
    pub fn apply_edit(&mut self, edited: ShoppingList) {
        self.current_local = edited;
        self.dirty = true;
    }

    /// Install the outcome of a successful sync round.
    pub fn install_sync(
        &mut self,
        current_local: ShoppingList,
        previous_sync: SyncedShoppingList,
        dirty: bool,
        synced_at: i64,
    ) {
        self.current_local = current_local;
        self.previous_sync = Some(previous_sync);
        self.dirty = dirty;
        self.last_synced_at = Some(synced_at);
    }
}
