//! Shopping list and sync snapshot models

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::{CategoryId, Item, ItemId};
use crate::error::{Error, Result};

uuid_id!(
    /// A unique identifier for a shopping list
    ListId
);

/// Opaque server-issued identifier of one list snapshot.
///
/// Tokens are minted per mutation; two holders of the same token hold the same
/// list content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncToken(String);

impl SyncToken {
    /// Mint a fresh, time-ordered token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SyncToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SyncToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SyncToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ordered list of items; order is display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingList {
    pub id: ListId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl ShoppingList {
    /// An untitled list with no items.
    #[must_use]
    pub const fn empty(id: ListId) -> Self {
        Self {
            id,
            title: String::new(),
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ListId::new(),
            title: title.into().trim().to_string(),
            items: Vec::new(),
        }
    }

    /// Check that every item is valid and item ids are unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.items.len());
        for item in &self.items {
            item.validate()?;
            if !seen.insert(item.id) {
                return Err(Error::InvalidInput(format!(
                    "list {} contains item {} more than once",
                    self.id, item.id
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == *id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    /// A copy of this list with `item` appended.
    #[must_use]
    pub fn with_item(&self, item: Item) -> Self {
        let mut next = self.clone();
        next.items.push(item);
        next
    }

    /// A copy of this list with the item of the same id replaced in place.
    pub fn with_replaced_item(&self, item: Item) -> Result<Self> {
        let mut next = self.clone();
        let slot = next
            .items
            .iter_mut()
            .find(|existing| existing.id == item.id)
            .ok_or_else(|| Error::NotFound(format!("item {}", item.id)))?;
        *slot = item;
        Ok(next)
    }

    /// A copy of this list without the given item, plus the removed item.
    pub fn without_item(&self, id: &ItemId) -> Result<(Self, Item)> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == *id)
            .ok_or_else(|| Error::NotFound(format!("item {id}")))?;
        let mut next = self.clone();
        let removed = next.items.remove(index);
        Ok((next, removed))
    }

    #[must_use]
    pub fn with_title(&self, title: impl Into<String>) -> Self {
        Self {
            title: title.into().trim().to_string(),
            ..self.clone()
        }
    }
}

/// A list snapshot together with the token the server issued for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedShoppingList {
    #[serde(flatten)]
    pub list: ShoppingList,
    pub token: SyncToken,
}

impl SyncedShoppingList {
    #[must_use]
    pub const fn new(list: ShoppingList, token: SyncToken) -> Self {
        Self { list, token }
    }

    pub const fn id(&self) -> ListId {
        self.list.id
    }

    /// Validate a snapshot received from the server for `expected` list.
    pub fn validate_for(&self, expected: &ListId) -> Result<()> {
        if self.list.id != *expected {
            return Err(Error::MalformedResponse(format!(
                "expected list {expected}, received {}",
                self.list.id
            )));
        }
        if self.token.as_str().trim().is_empty() {
            return Err(Error::MalformedResponse(
                "snapshot is missing its sync token".to_string(),
            ));
        }
        self.list
            .validate()
            .map_err(|error| Error::MalformedResponse(error.to_string()))
    }
}

/// Body of `POST /api/{listId}/sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub previous_sync: Option<SyncedShoppingList>,
    pub current_state: ShoppingList,
}

/// A suggestion for item names the user has entered before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
}
