//! Persisted list records, keyed by list id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{ListId, SyncedShoppingList};

/// Trait for authoritative list storage.
pub trait ListRepository: Send + Sync + 'static {
    /// Load a list record, `None` when the id is unknown.
    fn load(&self, id: &ListId) -> Result<Option<SyncedShoppingList>>;

    /// Persist a list record, replacing any previous one.
    fn save(&self, list: &SyncedShoppingList) -> Result<()>;

    /// Ids of all stored lists.
    fn list_ids(&self) -> Result<Vec<ListId>>;
}

/// One pretty-printed JSON file per list in a directory.
pub struct JsonDirectoryRepository {
    dir: PathBuf,
}

impl JsonDirectoryRepository {
    /// Open (and create if needed) a repository rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &ListId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl ListRepository for JsonDirectoryRepository {
    fn load(&self, id: &ListId) -> Result<Option<SyncedShoppingList>> {
        let path = self.record_path(id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let list = serde_json::from_str::<SyncedShoppingList>(&raw).map_err(|error| {
            Error::Storage(format!("Failed to parse {}: {error}", path.display()))
        })?;
        Ok(Some(list))
    }

    fn save(&self, list: &SyncedShoppingList) -> Result<()> {
        let path = self.record_path(&list.id());
        let temp_path = path.with_extension("json.tmp");
        let serialized = serde_json::to_string_pretty(list)?;
        std::fs::write(&temp_path, serialized)?;
        std::fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<ListId>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match stem.parse::<ListId>() {
                Ok(id) => ids.push(id),
                Err(_) => tracing::debug!("Skipping unrelated file {}", path.display()),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// In-memory repository for tests and embedded servers.
#[derive(Default)]
pub struct MemoryListRepository {
    lists: Mutex<HashMap<ListId, SyncedShoppingList>>,
}

impl MemoryListRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ListId, SyncedShoppingList>>> {
        self.lists
            .lock()
            .map_err(|_| Error::Storage("memory repository lock poisoned".to_string()))
    }
}

impl ListRepository for MemoryListRepository {
    fn load(&self, id: &ListId) -> Result<Option<SyncedShoppingList>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn save(&self, list: &SyncedShoppingList) -> Result<()> {
        self.lock()?.insert(list.id(), list.clone());
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<ListId>> {
        let mut ids = self.lock()?.keys().copied().collect::<Vec<_>>();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, LocalItem, ShoppingList, SyncToken};
    use pretty_assertions::assert_eq;

    fn sample() -> SyncedShoppingList {
        let list = ShoppingList::new("Groceries")
            .with_item(Item::create(LocalItem::new("Milk").with_quantity("1l")).unwrap());
        SyncedShoppingList::new(list, SyncToken::generate())
    }

    #[test]
    fn json_repository_round_trips_records() {
        let dir = tempfile::tempdir().unwrap();
        let repository = JsonDirectoryRepository::open(dir.path().join("lists")).unwrap();
        let list = sample();

        assert_eq!(repository.load(&list.id()).unwrap(), None);
        repository.save(&list).unwrap();
        assert_eq!(repository.load(&list.id()).unwrap(), Some(list.clone()));
        assert_eq!(repository.list_ids().unwrap(), vec![list.id()]);
    }

    #[test]
    fn json_repository_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("not-a-uuid.json"), "{}").unwrap();
        let repository = JsonDirectoryRepository::open(dir.path()).unwrap();

        assert!(repository.list_ids().unwrap().is_empty());
    }

    #[test]
    fn json_repository_reports_corrupt_records() {
        let dir = tempfile::tempdir().unwrap();
        let repository = JsonDirectoryRepository::open(dir.path()).unwrap();
        let id = ListId::new();
        std::fs::write(dir.path().join(format!("{id}.json")), "not json").unwrap();

        let err = repository.load(&id).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn memory_repository_replaces_records() {
        let repository = MemoryListRepository::new();
        let list = sample();
        repository.save(&list).unwrap();

        let renamed = SyncedShoppingList::new(list.list.with_title("Party"), SyncToken::generate());
        repository.save(&renamed).unwrap();
        assert_eq!(repository.load(&list.id()).unwrap(), Some(renamed));
    }
}
