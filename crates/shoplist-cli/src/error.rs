use std::io;

use shoplist_core::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] shoplist_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No item name provided")]
    EmptyName,
    #[error("No list title provided")]
    EmptyTitle,
    #[error("{0} ID cannot be empty")]
    EmptyId(&'static str),
    #[error("Invalid category ID: {0}")]
    InvalidCategory(String),
    #[error("List not found for id/prefix: {0}")]
    ListNotFound(String),
    #[error("Item not found for id/prefix: {0}")]
    ItemNotFound(String),
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Nothing to update; pass --name, --quantity, --category or a --clear flag")]
    NothingToUpdate,
}
