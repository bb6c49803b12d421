//! Push channels delivering "list changed" tokens to clients.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::{ListId, SyncToken};
use crate::store::SyncStore;

/// Tokens pushed for one list. The stream ends when the channel closes.
pub type TokenStream = BoxStream<'static, SyncToken>;

/// Opens a push subscription for a list.
#[async_trait]
pub trait NotificationChannel: Send + Sync + 'static {
    async fn open(&self, list_id: &ListId) -> Result<TokenStream>;
}

/// WebSocket subscription to `GET /api/{listId}/socket`.
#[derive(Debug, Clone)]
pub struct WebSocketChannel {
    socket_base: String,
    connect_timeout: Duration,
}

impl WebSocketChannel {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        Ok(Self {
            socket_base: websocket_base(&config.server_url)?,
            connect_timeout: config.request_timeout,
        })
    }

    pub fn socket_url(&self, list_id: &ListId) -> String {
        format!("{}/api/{list_id}/socket", self.socket_base)
    }
}

#[async_trait]
impl NotificationChannel for WebSocketChannel {
    async fn open(&self, list_id: &ListId) -> Result<TokenStream> {
        let url = self.socket_url(list_id);
        let (socket, _) = timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| Error::Network(format!("Timed out connecting to {url}")))?
            .map_err(|error| Error::Network(format!("WebSocket connect failed: {error}")))?;
        tracing::debug!(list = %list_id, "Opened push socket");

        let tokens = stream::unfold(socket, |mut socket| async move {
            loop {
                match socket.next().await? {
                    Ok(Message::Text(text)) => {
                        let token = text.trim();
                        if !token.is_empty() {
                            return Some((SyncToken::from(token), socket));
                        }
                    }
                    Ok(Message::Close(_)) => return None,
                    Ok(_) => {}
                    Err(error) => {
                        tracing::debug!("Push socket failed: {error}");
                        return None;
                    }
                }
            }
        });
        Ok(tokens.boxed())
    }
}

fn websocket_base(server_url: &str) -> Result<String> {
    let base = server_url.trim().trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("https://") {
        Ok(format!("wss://{rest}"))
    } else if let Some(rest) = base.strip_prefix("http://") {
        Ok(format!("ws://{rest}"))
    } else {
        Err(Error::InvalidInput(format!(
            "server URL must start with http:// or https://, got {base}"
        )))
    }
}

/// Subscription straight to a [`SyncStore`]'s change feed.
///
/// Mirrors the socket endpoint: the current token is delivered first, then
/// one token per change of the list.
#[derive(Clone)]
pub struct InProcessChannel {
    store: Arc<SyncStore>,
}

impl InProcessChannel {
    pub const fn new(store: Arc<SyncStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationChannel for InProcessChannel {
    async fn open(&self, list_id: &ListId) -> Result<TokenStream> {
        let receiver = self.store.subscribe();
        let current = self.store.snapshot(list_id).await?;
        let list_id = *list_id;

        let changes = stream::unfold(receiver, move |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(change) if change.list_id == list_id => {
                        return Some((change.token, receiver));
                    }
                    Ok(_) => {}
                    // Later changes carry a newer token anyway.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(list = %list_id, skipped, "Change feed lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream::once(async move { current.token }).chain(changes).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, LocalItem};

    #[test]
    fn websocket_base_maps_schemes() {
        assert_eq!(websocket_base("http://localhost:8080/").unwrap(), "ws://localhost:8080");
        assert_eq!(websocket_base("https://lists.example.com").unwrap(), "wss://lists.example.com");
        assert!(websocket_base("ftp://example.com").is_err());
    }

    #[test]
    fn socket_url_targets_list_endpoint() {
        let channel = WebSocketChannel::new(&SyncConfig::default()).unwrap();
        let id = ListId::new();
        assert_eq!(
            channel.socket_url(&id),
            format!("ws://127.0.0.1:8080/api/{id}/socket")
        );
    }

    #[tokio::test]
    async fn in_process_channel_sends_current_then_changes_for_list() {
        let store = Arc::new(SyncStore::in_memory());
        let groceries = store.create_list("Groceries").await.unwrap();
        let party = store.create_list("Party").await.unwrap();
        let channel = InProcessChannel::new(store.clone());

        let mut tokens = channel.open(&groceries.id()).await.unwrap();
        assert_eq!(tokens.next().await, Some(groceries.token.clone()));

        let milk = Item::create(LocalItem::new("Milk")).unwrap();
        store
            .apply_and_sync(&party.id(), Some(&party), &party.list.with_item(milk.clone()))
            .await
            .unwrap();
        let synced = store
            .apply_and_sync(&groceries.id(), Some(&groceries), &groceries.list.with_item(milk))
            .await
            .unwrap();

        assert_eq!(tokens.next().await, Some(synced.token));
    }

    #[tokio::test]
    async fn in_process_channel_rejects_unknown_list() {
        let channel = InProcessChannel::new(Arc::new(SyncStore::in_memory()));
        let result = channel.open(&ListId::new()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
