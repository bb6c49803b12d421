//! Request/response transports between a client and the sync server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::{CompletionItem, ListId, SyncRequest, SyncedShoppingList};
use crate::store::SyncStore;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Longest slice of a non-JSON error body quoted in an error.
const MAX_ERROR_EXCERPT: usize = 180;

/// Calls a client makes into the sync server.
#[async_trait]
pub trait SyncTransport: Send + Sync + 'static {
    /// Current authoritative snapshot, used when the client has no ancestor.
    async fn fetch_snapshot(&self, list_id: &ListId) -> Result<SyncedShoppingList>;

    /// Submit local state against the client's last ancestor.
    async fn push_sync(
        &self,
        list_id: &ListId,
        request: &SyncRequest,
    ) -> Result<SyncedShoppingList>;

    /// Item name suggestions for the list.
    async fn fetch_completions(&self, list_id: &ListId) -> Result<Vec<CompletionItem>>;
}

/// Answers whether the host currently has connectivity.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync + 'static {
    async fn is_online(&self) -> bool;
}

/// HTTP client for the shoplist API.
#[derive(Clone)]
pub struct HttpSyncClient {
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct CreateListRequest<'a> {
    title: &'a str,
}

impl HttpSyncClient {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.server_url.trim_end_matches('/').to_string(),
            client: Client::builder().timeout(config.request_timeout).build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a new list on the server.
    pub async fn create_list(&self, title: &str) -> Result<SyncedShoppingList> {
        let response = self
            .client
            .post(format!("{}/api/lists", self.base_url))
            .header("Accept", "application/json")
            .json(&CreateListRequest { title })
            .send()
            .await?;
        read_json(response).await
    }

    fn list_url(&self, list_id: &ListId, endpoint: &str) -> String {
        format!("{}/api/{list_id}/{endpoint}", self.base_url)
    }
}

#[async_trait]
impl SyncTransport for HttpSyncClient {
    async fn fetch_snapshot(&self, list_id: &ListId) -> Result<SyncedShoppingList> {
        let response = self
            .client
            .get(self.list_url(list_id, "sync"))
            .header("Accept", "application/json")
            .send()
            .await?;
        read_json(response).await
    }

    async fn push_sync(
        &self,
        list_id: &ListId,
        request: &SyncRequest,
    ) -> Result<SyncedShoppingList> {
        let response = self
            .client
            .post(self.list_url(list_id, "sync"))
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn fetch_completions(&self, list_id: &ListId) -> Result<Vec<CompletionItem>> {
        let response = self
            .client
            .get(self.list_url(list_id, "completions"))
            .header("Accept", "application/json")
            .send()
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl ConnectivityProbe for HttpSyncClient {
    async fn is_online(&self) -> bool {
        self.client
            .get(format!("{}/healthz", self.base_url))
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = parse_api_error(status, &body);
        return Err(if status == StatusCode::NOT_FOUND {
            Error::NotFound(message)
        } else {
            Error::Network(message)
        });
    }

    serde_json::from_str(&body).map_err(|error| Error::MalformedResponse(error.to_string()))
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.error {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed: String = body.trim().chars().take(MAX_ERROR_EXCERPT).collect();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

/// Transport calling a [`SyncStore`] in the same process.
#[derive(Clone)]
pub struct InProcessTransport {
    store: Arc<SyncStore>,
}

impl InProcessTransport {
    pub const fn new(store: Arc<SyncStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SyncTransport for InProcessTransport {
    async fn fetch_snapshot(&self, list_id: &ListId) -> Result<SyncedShoppingList> {
        self.store.snapshot(list_id).await
    }

    async fn push_sync(
        &self,
        list_id: &ListId,
        request: &SyncRequest,
    ) -> Result<SyncedShoppingList> {
        self.store
            .apply_and_sync(
                list_id,
                request.previous_sync.as_ref(),
                &request.current_state,
            )
            .await
    }

    async fn fetch_completions(&self, list_id: &ListId) -> Result<Vec<CompletionItem>> {
        self.store.completions(list_id).await
    }
}

#[async_trait]
impl ConnectivityProbe for InProcessTransport {
    async fn is_online(&self) -> bool {
        true
    }
}
