use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shoplist_core::store::{JsonDirectoryRepository, ListChange, MemoryListRepository};
use shoplist_core::{CompletionItem, ListId, SyncRequest, SyncStore, SyncToken, SyncedShoppingList};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    store: Arc<SyncStore>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self, shoplist_core::Error> {
        let store = match &config.data_dir {
            Some(dir) => {
                let repository = JsonDirectoryRepository::open(dir)?;
                tracing::info!("Storing lists in {}", repository.dir().display());
                SyncStore::new(Arc::new(repository), config.notify_capacity)
            }
            None => {
                tracing::warn!("SHOPLIST_DATA_DIR is :memory:; lists are lost on restart");
                SyncStore::new(Arc::new(MemoryListRepository::new()), config.notify_capacity)
            }
        };
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }
}

pub fn app_router(state: AppState) -> Router {
    let list_routes = Router::new()
        .route("/lists", post(create_list))
        .route("/{list_id}/sync", get(fetch_list).post(sync_list))
        .route("/{list_id}/completions", get(list_completions))
        .route("/{list_id}/socket", get(list_socket));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", list_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

fn parse_list_id(raw: &str) -> Result<ListId, AppError> {
    raw.parse::<ListId>()
        .map_err(|_| AppError::bad_request(format!("'{raw}' is not a valid list id")))
}

#[derive(Debug, Default, Deserialize)]
struct CreateListRequest {
    #[serde(default)]
    title: String,
}

async fn create_list(
    State(state): State<AppState>,
    payload: Result<Json<CreateListRequest>, JsonRejection>,
) -> Result<Json<SyncedShoppingList>, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let created = state.store.create_list(&request.title).await?;
    Ok(Json(created))
}

async fn fetch_list(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> Result<Json<SyncedShoppingList>, AppError> {
    let list_id = parse_list_id(&list_id)?;
    Ok(Json(state.store.snapshot(&list_id).await?))
}

async fn sync_list(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Json<SyncedShoppingList>, AppError> {
    let list_id = parse_list_id(&list_id)?;
    let Json(request) = payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    let synced = state
        .store
        .apply_and_sync(
            &list_id,
            request.previous_sync.as_ref(),
            &request.current_state,
        )
        .await?;
    tracing::debug!(
        endpoint = "sync",
        list = %list_id,
        had_ancestor = request.previous_sync.is_some(),
        token = %synced.token,
        "Answered sync request"
    );
    Ok(Json(synced))
}

async fn list_completions(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> Result<Json<Vec<CompletionItem>>, AppError> {
    let list_id = parse_list_id(&list_id)?;
    Ok(Json(state.store.completions(&list_id).await?))
}

async fn list_socket(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let list_id = parse_list_id(&list_id)?;
    let changes = state.store.subscribe();
    let current = state.store.snapshot(&list_id).await?;

    Ok(upgrade.on_upgrade(move |socket| {
        push_tokens(socket, state.store, list_id, current.token, changes)
    }))
}

/// Send the current token, then one frame per change of the list, until
/// either side goes away.
async fn push_tokens(
    mut socket: WebSocket,
    store: Arc<SyncStore>,
    list_id: ListId,
    current: SyncToken,
    mut changes: broadcast::Receiver<ListChange>,
) {
    tracing::debug!(list = %list_id, "Push socket connected");
    if send_token(&mut socket, &current).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            change = changes.recv() => {
                let token = match change {
                    Ok(change) if change.list_id == list_id => change.token,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(list = %list_id, skipped, "Push socket lagged, resending current token");
                        match store.snapshot(&list_id).await {
                            Ok(snapshot) => snapshot.token,
                            Err(error) => {
                                tracing::warn!(list = %list_id, "Could not load list for push socket: {error}");
                                break;
                            }
                        }
                    }
                    Err(RecvError::Closed) => break,
                };
                if send_token(&mut socket, &token).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!(list = %list_id, "Push socket closed");
}

async fn send_token(socket: &mut WebSocket, token: &SyncToken) -> Result<(), axum::Error> {
    socket.send(Message::Text(token.to_string().into())).await
}
