//! shoplist-core - Core library for shoplist
//!
//! This crate contains the shared models, the three-way list merge, the
//! authoritative server-side store and the client sync orchestrator used by
//! every shoplist interface (API server, CLI).

pub mod config;
pub mod error;
pub mod merge;
pub mod models;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use merge::{merge, MergeOutcome};
pub use models::{
    ClientSyncState, CompletionItem, Item, ItemId, ListId, LocalItem, ShoppingList, SyncRequest,
    SyncToken, SyncedShoppingList,
};
pub use state::{ConnectionState, SyncStatus};
pub use store::{ListChange, SyncStore};
