//! Three-way merge of shopping lists.
//!
//! Given the last snapshot both sides agreed on (the ancestor), the client's
//! list (local) and the server's list (remote), produce a single list that
//! keeps every deliberate edit:
//!
//! - an item added on one side is kept;
//! - a deletion is honored unless the other side edited the item, in which
//!   case the edit wins and the item is resurrected;
//! - an item edited on one side only takes the edited value;
//! - an item edited differently on both sides takes the remote value.
//!
//! The merged order follows the remote list, with items the remote list does
//! not position appended in local order.
//!
//! `changed` reports that the merge overrode what the local side was holding
//! in a way the local side must propagate (resurrections, remote edits and
//! conflicts). Clients resync while it is set; a second merge against an
//! unchanged remote always reports `false`.

use std::collections::{HashMap, HashSet};

use crate::models::{Item, ItemId, ShoppingList};

/// Result of [`merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged: ShoppingList,
    pub changed: bool,
}

/// Merge `local` and `remote` against their common `ancestor`.
///
/// An absent ancestor treats every item as newly added on its side.
pub fn merge(
    ancestor: Option<&ShoppingList>,
    local: &ShoppingList,
    remote: &ShoppingList,
) -> MergeOutcome {
    let base = ancestor.map(index_items).unwrap_or_default();
    let local_items = index_items(local);
    let remote_items = index_items(remote);

    let mut changed = false;
    let mut resolved: HashMap<ItemId, Item> = HashMap::new();
    let mut seen = HashSet::new();

    let all_ids = remote
        .items
        .iter()
        .chain(&local.items)
        .chain(ancestor.map_or(&[][..], |list| list.items.as_slice()))
        .map(|item| item.id);

    for id in all_ids {
        if !seen.insert(id) {
            continue;
        }
        let resolution = resolve_item(
            base.get(&id).copied(),
            local_items.get(&id).copied(),
            remote_items.get(&id).copied(),
        );
        changed |= resolution.changed;
        if let Some(item) = resolution.item {
            resolved.insert(id, item);
        }
    }

    let mut items = Vec::with_capacity(resolved.len());
    for item in remote.items.iter().chain(&local.items) {
        if let Some(chosen) = resolved.remove(&item.id) {
            items.push(chosen);
        }
    }

    let title = resolve_title(
        ancestor.map(|list| list.title.as_str()),
        &local.title,
        &remote.title,
    );
    changed |= title.changed;

    MergeOutcome {
        merged: ShoppingList {
            id: remote.id,
            title: title.value,
            items,
        },
        changed,
    }
}

struct ItemResolution {
    item: Option<Item>,
    changed: bool,
}

impl ItemResolution {
    fn keep(item: &Item) -> Self {
        Self {
            item: Some(item.clone()),
            changed: false,
        }
    }

    fn overriding(item: &Item) -> Self {
        Self {
            item: Some(item.clone()),
            changed: true,
        }
    }

    const fn discard() -> Self {
        Self {
            item: None,
            changed: false,
        }
    }
}

fn resolve_item(
    ancestor: Option<&Item>,
    local: Option<&Item>,
    remote: Option<&Item>,
) -> ItemResolution {
    match (ancestor, local, remote) {
        (None, Some(item), None) | (None, None, Some(item)) => ItemResolution::keep(item),
        // Ids are random per creation, so this only happens for identical
        // submissions; remote wins if they ever diverge.
        (None, Some(local), Some(remote)) if local == remote => ItemResolution::keep(remote),
        (None, Some(_), Some(remote)) => ItemResolution::overriding(remote),
        (None, None, None) | (Some(_), None, None) => ItemResolution::discard(),
        (Some(base), None, Some(survivor)) | (Some(base), Some(survivor), None) => {
            if survivor == base {
                ItemResolution::discard()
            } else {
                // Edit beats a concurrent delete.
                ItemResolution::overriding(survivor)
            }
        }
        (Some(base), Some(local), Some(remote)) => {
            match (local == base, remote == base) {
                (true, true) | (false, true) => ItemResolution::keep(local),
                (true, false) => ItemResolution::overriding(remote),
                (false, false) if local == remote => ItemResolution::keep(remote),
                (false, false) => ItemResolution::overriding(remote),
            }
        }
    }
}

struct TitleResolution {
    value: String,
    changed: bool,
}

fn resolve_title(ancestor: Option<&str>, local: &str, remote: &str) -> TitleResolution {
    let take_remote = |changed| TitleResolution {
        value: remote.to_string(),
        changed,
    };
    match ancestor {
        None => take_remote(false),
        Some(_) if local == remote => take_remote(false),
        Some(base) if local == base => take_remote(true),
        Some(base) if remote == base => TitleResolution {
            value: local.to_string(),
            changed: false,
        },
        Some(_) => take_remote(true),
    }
}

fn index_items(list: &ShoppingList) -> HashMap<ItemId, &Item> {
    list.items.iter().map(|item| (item.id, item)).collect()
}
