//! Durable storage of client sync state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{ClientSyncState, ListId};

/// Where a client keeps its [`ClientSyncState`] between runs.
pub trait ClientStore: Send + Sync + 'static {
    fn load(&self, list_id: &ListId) -> Result<Option<ClientSyncState>>;

    fn save(&self, state: &ClientSyncState) -> Result<()>;

    fn remove(&self, list_id: &ListId) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ClientStateDocument {
    #[serde(default)]
    lists: Vec<ClientSyncState>,
}

/// All lists of one client in a single JSON document.
#[derive(Clone)]
pub struct JsonClientStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonClientStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ids of every list with stored state.
    pub fn list_ids(&self) -> Result<Vec<ListId>> {
        Ok(self
            .read_document()?
            .lists
            .iter()
            .map(ClientSyncState::list_id)
            .collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| Error::Storage("client store lock poisoned".to_string()))
    }

    fn read_document(&self) -> Result<ClientStateDocument> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ClientStateDocument::default());
            }
            Err(error) => return Err(error.into()),
        };
        if raw.trim().is_empty() {
            return Ok(ClientStateDocument::default());
        }
        serde_json::from_str(&raw).map_err(|error| {
            Error::Storage(format!("Failed to parse {}: {error}", self.path.display()))
        })
    }

    fn write_document(&self, document: &ClientStateDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, serde_json::to_string_pretty(document)?)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl ClientStore for JsonClientStore {
    fn load(&self, list_id: &ListId) -> Result<Option<ClientSyncState>> {
        let _guard = self.lock()?;
        Ok(self
            .read_document()?
            .lists
            .into_iter()
            .find(|state| state.list_id() == *list_id))
    }

    fn save(&self, state: &ClientSyncState) -> Result<()> {
        let _guard = self.lock()?;
        let mut document = self.read_document()?;
        match document
            .lists
            .iter_mut()
            .find(|existing| existing.list_id() == state.list_id())
        {
            Some(existing) => *existing = state.clone(),
            None => document.lists.push(state.clone()),
        }
        self.write_document(&document)
    }

    fn remove(&self, list_id: &ListId) -> Result<()> {
        let _guard = self.lock()?;
        let mut document = self.read_document()?;
        let before = document.lists.len();
        document.lists.retain(|state| state.list_id() != *list_id);
        if document.lists.len() == before {
            return Ok(());
        }
        self.write_document(&document)
    }
}

/// Process-local client store; clones share state.
#[derive(Clone, Default)]
pub struct MemoryClientStore {
    states: Arc<Mutex<HashMap<ListId, ClientSyncState>>>,
}

impl MemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ListId, ClientSyncState>>> {
        self.states
            .lock()
            .map_err(|_| Error::Storage("memory client store lock poisoned".to_string()))
    }
}

impl ClientStore for MemoryClientStore {
    fn load(&self, list_id: &ListId) -> Result<Option<ClientSyncState>> {
        Ok(self.lock()?.get(list_id).cloned())
    }

    fn save(&self, state: &ClientSyncState) -> Result<()> {
        self.lock()?.insert(state.list_id(), state.clone());
        Ok(())
    }

    fn remove(&self, list_id: &ListId) -> Result<()> {
        self.lock()?.remove(list_id);
        Ok(())
    }
}
