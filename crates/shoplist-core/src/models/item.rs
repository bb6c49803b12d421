//! Item model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::non_blank;

uuid_id!(
    /// A unique identifier for a list item, using UUID v7
    ItemId
);

uuid_id!(
    /// Identifier of a category definition (managed outside the sync engine)
    CategoryId
);

/// Editable fields of an item, before it has an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
}

impl LocalItem {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: None,
            quantity: None,
        }
    }

    #[must_use]
    pub fn with_quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = Some(quantity.into());
        self
    }

    #[must_use]
    pub const fn with_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }
}

/// An entry on a shopping list.
///
/// Two items are the same entry when their `id` matches; they are the same
/// *value* only when every field matches. Edits produce a new `Item` with the
/// same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
}

impl Item {
    /// Create a new item with a fresh id.
    pub fn create(local: LocalItem) -> Result<Self> {
        Self::from_local(ItemId::new(), local)
    }

    /// Build an item with the given id from editable fields, normalizing text.
    pub fn from_local(id: ItemId, local: LocalItem) -> Result<Self> {
        let item = Self {
            id,
            name: local.name.trim().to_string(),
            category: local.category,
            quantity: non_blank(local.quantity),
        };
        item.validate()?;
        Ok(item)
    }

    /// Check field-level invariants.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "item {} must have a non-empty name",
                self.id
            )));
        }
        if self
            .quantity
            .as_deref()
            .is_some_and(|quantity| quantity.trim().is_empty())
        {
            return Err(Error::InvalidInput(format!(
                "item {} has a blank quantity",
                self.id
            )));
        }
        Ok(())
    }

    /// Human-readable fingerprint used to recognise recently deleted entries.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        match self.quantity.as_deref() {
            Some(quantity) => format!("{quantity} {}", self.name),
            None => self.name.clone(),
        }
    }

    /// The editable part of this item.
    #[must_use]
    pub fn to_local(&self) -> LocalItem {
        LocalItem {
            name: self.name.clone(),
            category: self.category,
            quantity: self.quantity.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_unique() {
        assert_ne!(ItemId::new(), ItemId::new());
    }

    #[test]
    fn test_item_id_parse() {
        let id = ItemId::new();
        let parsed: ItemId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_item_id_parse_trims_and_rejects_garbage() {
        let id = ItemId::new();
        let padded = format!("  {id}\n");
        assert_eq!(padded.parse::<ItemId>().unwrap(), id);
        assert!("milk".parse::<ItemId>().is_err());
        assert!("".parse::<CategoryId>().is_err());
    }

    #[test]
    fn test_create_trims_fields() {
        let item = Item::create(LocalItem::new("  Milk ").with_quantity(" 2 ")).unwrap();
        assert_eq!(item.name, "Milk");
        assert_eq!(item.quantity.as_deref(), Some("2"));
    }

    #[test]
    fn test_blank_quantity_becomes_absent() {
        let item = Item::create(LocalItem::new("Milk").with_quantity("   ")).unwrap();
        assert_eq!(item.quantity, None);
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = Item::create(LocalItem::new("   ")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_fingerprint() {
        let plain = Item::create(LocalItem::new("Eggs")).unwrap();
        assert_eq!(plain.fingerprint(), "Eggs");

        let counted = Item::create(LocalItem::new("Eggs").with_quantity("12")).unwrap();
        assert_eq!(counted.fingerprint(), "12 Eggs");
    }

    #[test]
    fn test_json_omits_absent_fields() {
        let item = Item::create(LocalItem::new("Bread")).unwrap();
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["name"], "Bread");
        assert!(json.get("quantity").is_none());
        assert!(json.get("category").is_none());
    }
}
