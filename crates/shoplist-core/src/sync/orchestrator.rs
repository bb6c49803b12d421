//! Client sync orchestrator.
//!
//! One [`SyncOrchestrator`] drives a single list on a single client. It owns
//! the [`ClientSyncState`], applies local edits, schedules debounced syncs and
//! keeps a push channel open while online. At most one sync round trip is in
//! flight at any time; requests arriving meanwhile are skipped, and edits made
//! during a round trip are folded into its result and trigger another round.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use futures::StreamExt;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

use super::channel::NotificationChannel;
use super::local_store::ClientStore;
use super::transport::{ConnectivityProbe, SyncTransport};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::merge::merge;
use crate::models::{
    ClientSyncState, CompletionItem, Item, ItemId, ListId, LocalItem, ShoppingList, SyncRequest,
    SyncToken, SyncedShoppingList,
};
use crate::state::{ConnectionState, SyncStatus};
use crate::util::unix_millis_now;

/// Result of a [`SyncOrchestrator::sync`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another sync was already in flight; nothing was sent.
    Skipped,
    /// Rounds were run; `dirty` is true when the round limit was hit first.
    Completed { rounds: u32, dirty: bool },
}

/// Keeps one list on this client in sync with the server.
pub struct SyncOrchestrator<T, S> {
    shared: Arc<Shared<T, S>>,
}

impl<T, S> Clone for SyncOrchestrator<T, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<T, S> {
    list_id: ListId,
    config: SyncConfig,
    transport: T,
    store: S,
    state: Mutex<ClientSyncState>,
    completions: Mutex<Vec<CompletionItem>>,
    in_flight: AtomicBool,
    reset_epoch: AtomicU64,
    sync_generation: AtomicU64,
    notification_generation: AtomicU64,
    round_trips: AtomicU64,
    status: watch::Sender<SyncStatus>,
    online: Notify,
    connection: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Marks a sync as in flight until dropped.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    status: &'a watch::Sender<SyncStatus>,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool, status: &'a watch::Sender<SyncStatus>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        status.send_modify(|status| status.syncing = true);
        Some(Self { flag, status })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.status.send_modify(|status| status.syncing = false);
    }
}

impl<T: SyncTransport, S: ClientStore> SyncOrchestrator<T, S> {
    /// Open the orchestrator for `list_id`, restoring persisted state if any.
    pub fn open(list_id: ListId, config: SyncConfig, transport: T, store: S) -> Result<Self> {
        let state = match store.load(&list_id)? {
            Some(state) => {
                tracing::debug!(list = %list_id, dirty = state.dirty, "Restored client state");
                state
            }
            None => ClientSyncState::new(list_id),
        };
        let (status, _) = watch::channel(SyncStatus {
            dirty: state.dirty,
            ..SyncStatus::default()
        });

        Ok(Self {
            shared: Arc::new(Shared {
                list_id,
                config,
                transport,
                store,
                state: Mutex::new(state),
                completions: Mutex::new(Vec::new()),
                in_flight: AtomicBool::new(false),
                reset_epoch: AtomicU64::new(0),
                sync_generation: AtomicU64::new(0),
                notification_generation: AtomicU64::new(0),
                round_trips: AtomicU64::new(0),
                status,
                online: Notify::new(),
                connection: std::sync::Mutex::new(None),
            }),
        })
    }

    pub fn list_id(&self) -> ListId {
        self.shared.list_id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    pub async fn state(&self) -> ClientSyncState {
        self.shared.state.lock().await.clone()
    }

    /// The list as this client currently sees it.
    pub async fn current_list(&self) -> ShoppingList {
        self.shared.state.lock().await.current_local.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.shared.status.subscribe()
    }

    /// Suggestions fetched after the last successful sync.
    pub async fn completions(&self) -> Vec<CompletionItem> {
        self.shared.completions.lock().await.clone()
    }

    /// Number of sync requests sent to the server so far.
    pub fn round_trips(&self) -> u64 {
        self.shared.round_trips.load(Ordering::Relaxed)
    }

    pub async fn create_item(&self, local: LocalItem) -> Result<Item> {
        let item = Item::create(local)?;
        self.edit(|state| {
            state.recently_deleted.forget(&item.fingerprint());
            let edited = state.current_local.with_item(item.clone());
            state.apply_edit(edited);
            Ok(())
        })
        .await?;
        tracing::debug!(list = %self.shared.list_id, item = %item.id, "Created item");
        Ok(item)
    }

    pub async fn update_item(&self, id: &ItemId, local: LocalItem) -> Result<Item> {
        let item = Item::from_local(*id, local)?;
        self.edit(|state| {
            let edited = state.current_local.with_replaced_item(item.clone())?;
            state.apply_edit(edited);
            Ok(())
        })
        .await?;
        Ok(item)
    }

    /// Delete an item, remembering its fingerprint in `recently_deleted`.
    pub async fn delete_item(&self, id: &ItemId) -> Result<Item> {
        self.edit(|state| {
            let (edited, removed) = state.current_local.without_item(id)?;
            state.recently_deleted.push(removed.fingerprint());
            state.apply_edit(edited);
            Ok(removed)
        })
        .await
    }

    pub async fn update_title(&self, title: &str) -> Result<()> {
        self.edit(|state| {
            let edited = state.current_local.with_title(title);
            state.apply_edit(edited);
            Ok(())
        })
        .await
    }

    /// Forget everything stored for this list. The next sync refetches it.
    pub async fn clear_local_state(&self) -> Result<()> {
        let list_id = self.shared.list_id;
        self.shared.reset_epoch.fetch_add(1, Ordering::AcqRel);
        {
            let mut state = self.shared.state.lock().await;
            *state = ClientSyncState::new(list_id);
            self.shared.store.remove(&list_id)?;
        }
        self.shared.completions.lock().await.clear();
        self.shared.status.send_modify(|status| status.dirty = false);
        tracing::info!(list = %list_id, "Cleared local state");
        Ok(())
    }

    async fn edit<R>(&self, apply: impl FnOnce(&mut ClientSyncState) -> Result<R>) -> Result<R> {
        let result = {
            let mut state = self.shared.state.lock().await;
            let result = apply(&mut state)?;
            // Saved under the lock so an older state never lands last.
            self.persist(&state);
            result
        };
        self.shared.status.send_modify(|status| status.dirty = true);
        self.request_sync();
        Ok(result)
    }

    /// Schedule a sync after the debounce period. Newer requests supersede
    /// pending ones.
    pub fn request_sync(&self) {
        let generation = self.shared.sync_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let delay = self.shared.config.debounce;
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if this.shared.sync_generation.load(Ordering::Acquire) != generation {
                return;
            }
            match this.sync().await {
                Ok(SyncOutcome::Skipped) => {
                    this.wait_until_idle().await;
                    this.request_sync();
                }
                Ok(SyncOutcome::Completed { .. }) => {}
                Err(error) => {
                    tracing::warn!(list = %this.shared.list_id, "Debounced sync failed: {error}");
                }
            }
        });
    }

    /// Run sync rounds until the list is clean or the round limit is hit.
    ///
    /// Returns [`SyncOutcome::Skipped`] without contacting the server when a
    /// sync is already in flight. On failure local state is left untouched
    /// and `last_sync_failed` is raised.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        let shared = &self.shared;
        let Some(_guard) = InFlightGuard::acquire(&shared.in_flight, &shared.status) else {
            tracing::debug!(list = %shared.list_id, "Sync already in flight");
            return Ok(SyncOutcome::Skipped);
        };
        shared.sync_generation.fetch_add(1, Ordering::AcqRel);

        match self.run_rounds().await {
            Ok(outcome) => {
                shared.status.send_modify(|status| {
                    status.last_sync_failed = false;
                    status.last_error = None;
                });
                self.refresh_completions().await;
                Ok(outcome)
            }
            Err(error) => {
                tracing::warn!(list = %shared.list_id, "Sync failed: {error}");
                shared.status.send_modify(|status| {
                    status.last_sync_failed = true;
                    status.last_error = Some(error.to_string());
                });
                Err(error)
            }
        }
    }

    /// Run a sync now, waiting out one already in flight.
    pub async fn flush(&self) -> Result<SyncOutcome> {
        loop {
            match self.sync().await? {
                SyncOutcome::Skipped => self.wait_until_idle().await,
                outcome => return Ok(outcome),
            }
        }
    }

    /// Resolve once no sync is in flight.
    async fn wait_until_idle(&self) {
        let mut status = self.subscribe_status();
        let _ = status.wait_for(|status| !status.syncing).await;
    }

    async fn run_rounds(&self) -> Result<SyncOutcome> {
        let list_id = self.shared.list_id;
        let max_rounds = self.shared.config.max_sync_rounds.max(1);
        let mut rounds = 0;
        loop {
            rounds += 1;
            let dirty = self.sync_round().await?;
            if !dirty {
                tracing::info!(list = %list_id, rounds, "Sync complete");
                return Ok(SyncOutcome::Completed { rounds, dirty });
            }
            if rounds >= max_rounds {
                tracing::warn!(list = %list_id, rounds, "Still dirty after maximum sync rounds");
                return Ok(SyncOutcome::Completed { rounds, dirty });
            }
            tracing::debug!(list = %list_id, rounds, "Dirty after round, syncing again");
        }
    }

    /// One round trip. Returns whether local state still needs syncing.
    async fn sync_round(&self) -> Result<bool> {
        let shared = &self.shared;
        let list_id = shared.list_id;
        let epoch = shared.reset_epoch.load(Ordering::Acquire);
        let (previous_sync, snapshot) = {
            let state = shared.state.lock().await;
            (state.previous_sync.clone(), state.current_local.clone())
        };

        shared.round_trips.fetch_add(1, Ordering::Relaxed);
        let (ancestor, response) = match previous_sync {
            None => {
                let remote = shared.transport.fetch_snapshot(&list_id).await?;
                (None, remote)
            }
            Some(previous) => {
                let request = SyncRequest {
                    previous_sync: Some(previous.clone()),
                    current_state: snapshot.clone(),
                };
                let response = shared.transport.push_sync(&list_id, &request).await?;
                (Some(previous.list), response)
            }
        };
        response.validate_for(&list_id)?;

        if shared.reset_epoch.load(Ordering::Acquire) != epoch {
            tracing::debug!(list = %list_id, "Local state was cleared mid-sync; discarding round");
            return Ok(true);
        }
        Ok(self.install(ancestor.as_ref(), &snapshot, response).await)
    }

    async fn install(
        &self,
        ancestor: Option<&ShoppingList>,
        snapshot: &ShoppingList,
        response: SyncedShoppingList,
    ) -> bool {
        let outcome = merge(ancestor, snapshot, &response.list);
        // Without an ancestor, local-only items are kept silently and still
        // have to be pushed.
        let mut dirty = match ancestor {
            Some(_) => outcome.changed,
            None => outcome.merged != response.list,
        };

        {
            let mut state = self.shared.state.lock().await;
            let merged = if state.current_local == *snapshot {
                outcome.merged
            } else {
                tracing::debug!(list = %self.shared.list_id, "Folding edits made during round trip");
                dirty = true;
                merge(Some(snapshot), &state.current_local, &outcome.merged).merged
            };
            state.install_sync(merged, response, dirty, unix_millis_now());
            self.persist(&state);
        }
        self.shared.status.send_modify(|status| status.dirty = dirty);
        dirty
    }

    async fn refresh_completions(&self) {
        match self
            .shared
            .transport
            .fetch_completions(&self.shared.list_id)
            .await
        {
            Ok(completions) => *self.shared.completions.lock().await = completions,
            Err(error) => {
                tracing::debug!(list = %self.shared.list_id, "Could not refresh completions: {error}");
            }
        }
    }

    fn persist(&self, state: &ClientSyncState) {
        if let Err(error) = self.shared.store.save(state) {
            tracing::warn!(list = %self.shared.list_id, "Failed to persist client state: {error}");
        }
    }

    /// React to a pushed token: sync after a short quiet period unless the
    /// token matches the one already held.
    pub fn handle_notification(&self, token: SyncToken) {
        let generation = self
            .shared
            .notification_generation
            .fetch_add(1, Ordering::AcqRel)
            + 1;
        let delay = self.shared.config.notification_debounce;
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if this.shared.notification_generation.load(Ordering::Acquire) != generation {
                return;
            }
            let up_to_date = this
                .shared
                .state
                .lock()
                .await
                .previous_sync
                .as_ref()
                .is_some_and(|previous| previous.token == token);
            if up_to_date {
                tracing::debug!(list = %this.shared.list_id, %token, "Already holding pushed token");
                return;
            }

            tracing::debug!(list = %this.shared.list_id, %token, "Pushed token differs, syncing");
            match this.sync().await {
                Ok(SyncOutcome::Skipped) => {
                    this.wait_until_idle().await;
                    this.handle_notification(token);
                }
                Ok(SyncOutcome::Completed { .. }) => {}
                Err(error) => {
                    tracing::warn!(list = %this.shared.list_id, "Pushed sync failed: {error}");
                }
            }
        });
    }

    /// Start the background connection loop, replacing any running one.
    pub fn start<C, P>(&self, channel: C, probe: P)
    where
        C: NotificationChannel,
        P: ConnectivityProbe,
    {
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_connection(channel, probe).await });
        let previous = self
            .shared
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop the connection loop and drop pending debounced work.
    pub fn shutdown(&self) {
        let handle = self
            .shared
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.shared.sync_generation.fetch_add(1, Ordering::AcqRel);
        self.shared
            .notification_generation
            .fetch_add(1, Ordering::AcqRel);
        self.set_connection(ConnectionState::Disconnected);
        tracing::debug!(list = %self.shared.list_id, "Orchestrator shut down");
    }

    /// Host regained connectivity; wake the connection loop if it is waiting.
    pub fn handle_online(&self) {
        self.shared.online.notify_one();
    }

    /// Host lost connectivity.
    pub fn handle_offline(&self) {
        self.set_connection(ConnectionState::Disconnected);
    }

    fn set_connection(&self, connection: ConnectionState) {
        self.shared.status.send_if_modified(|status| {
            if status.connection == connection {
                return false;
            }
            tracing::debug!(
                list = %self.shared.list_id,
                from = status.connection.label(),
                to = connection.label(),
                "Connection state changed"
            );
            status.connection = connection;
            true
        });
    }

    async fn run_connection<C, P>(self, channel: C, probe: P)
    where
        C: NotificationChannel,
        P: ConnectivityProbe,
    {
        let list_id = self.shared.list_id;
        loop {
            if let Err(error) = self.sync().await {
                tracing::debug!(list = %list_id, "Sync on (re)connect failed: {error}");
            }

            match channel.open(&list_id).await {
                Ok(mut tokens) => {
                    self.set_connection(ConnectionState::Socket);
                    tracing::info!(list = %list_id, "Push channel open");
                    while let Some(token) = tokens.next().await {
                        self.handle_notification(token);
                    }
                    tracing::info!(list = %list_id, "Push channel closed");
                }
                Err(error) => {
                    tracing::debug!(list = %list_id, "Could not open push channel: {error}");
                }
            }

            if probe.is_online().await {
                self.set_connection(ConnectionState::Polling);
                tokio::time::sleep(self.shared.config.reconnect_interval).await;
            } else {
                self.set_connection(ConnectionState::Disconnected);
                self.wait_until_online(&probe).await;
            }
        }
    }

    async fn wait_until_online<P: ConnectivityProbe>(&self, probe: &P) {
        loop {
            tokio::select! {
                () = tokio::time::sleep(self.shared.config.offline_poll_interval) => {}
                () = self.shared.online.notified() => {}
            }
            if probe.is_online().await {
                tracing::info!(list = %self.shared.list_id, "Back online");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::error::Error;
    use crate::store::SyncStore;
    use crate::sync::channel::{InProcessChannel, TokenStream};
    use crate::sync::local_store::MemoryClientStore;
    use crate::sync::transport::InProcessTransport;
    use pretty_assertions::assert_eq;

    /// In-process transport that counts round trips and can block or fail.
    #[derive(Clone)]
    struct ScriptedTransport {
        inner: InProcessTransport,
        calls: Arc<AtomicUsize>,
        gate: Option<Arc<Semaphore>>,
        fail: Arc<AtomicBool>,
    }

    impl ScriptedTransport {
        fn new(server: &Arc<SyncStore>) -> Self {
            Self {
                inner: InProcessTransport::new(server.clone()),
                calls: Arc::new(AtomicUsize::new(0)),
                gate: None,
                fail: Arc::new(AtomicBool::new(false)),
            }
        }

        fn gated(server: &Arc<SyncStore>, gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(server)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn enter(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|error| Error::Network(error.to_string()))?
                    .forget();
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Network("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SyncTransport for ScriptedTransport {
        async fn fetch_snapshot(&self, list_id: &ListId) -> Result<SyncedShoppingList> {
            self.enter().await?;
            self.inner.fetch_snapshot(list_id).await
        }

        async fn push_sync(
            &self,
            list_id: &ListId,
            request: &SyncRequest,
        ) -> Result<SyncedShoppingList> {
            self.enter().await?;
            self.inner.push_sync(list_id, request).await
        }

        async fn fetch_completions(&self, list_id: &ListId) -> Result<Vec<CompletionItem>> {
            self.inner.fetch_completions(list_id).await
        }
    }

    /// Answers every request with a different list's snapshot.
    struct ForeignListTransport {
        server: Arc<SyncStore>,
        other: ListId,
    }

    #[async_trait]
    impl SyncTransport for ForeignListTransport {
        async fn fetch_snapshot(&self, _list_id: &ListId) -> Result<SyncedShoppingList> {
            self.server.snapshot(&self.other).await
        }

        async fn push_sync(
            &self,
            _list_id: &ListId,
            _request: &SyncRequest,
        ) -> Result<SyncedShoppingList> {
            self.server.snapshot(&self.other).await
        }

        async fn fetch_completions(&self, _list_id: &ListId) -> Result<Vec<CompletionItem>> {
            Ok(Vec::new())
        }
    }

    struct ClosedChannel;

    #[async_trait]
    impl NotificationChannel for ClosedChannel {
        async fn open(&self, _list_id: &ListId) -> Result<TokenStream> {
            Err(Error::Network("socket refused".to_string()))
        }
    }

    #[derive(Clone)]
    struct ManualProbe(Arc<AtomicBool>);

    #[async_trait]
    impl ConnectivityProbe for ManualProbe {
        async fn is_online(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    type Client = SyncOrchestrator<ScriptedTransport, MemoryClientStore>;

    fn test_config() -> SyncConfig {
        SyncConfig {
            debounce: Duration::from_secs(60),
            notification_debounce: Duration::from_millis(10),
            reconnect_interval: Duration::from_millis(20),
            offline_poll_interval: Duration::from_millis(20),
            request_timeout: Duration::from_secs(1),
            max_sync_rounds: 5,
            ..SyncConfig::default()
        }
    }

    async fn server_with_list() -> (Arc<SyncStore>, ListId) {
        let server = Arc::new(SyncStore::in_memory());
        let created = server.create_list("Groceries").await.unwrap();
        (server, created.id())
    }

    fn client_with(list_id: ListId, transport: ScriptedTransport, config: SyncConfig) -> Client {
        SyncOrchestrator::open(list_id, config, transport, MemoryClientStore::new()).unwrap()
    }

    async fn synced_client(server: &Arc<SyncStore>, list_id: ListId) -> (Client, ScriptedTransport) {
        let transport = ScriptedTransport::new(server);
        let client = client_with(list_id, transport.clone(), test_config());
        client.sync().await.unwrap();
        (client, transport)
    }

    async fn eventually(condition: impl Fn() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    fn item_names(list: &ShoppingList) -> Vec<String> {
        list.items.iter().map(|item| item.name.clone()).collect()
    }

    #[tokio::test]
    async fn at_most_one_sync_in_flight() {
        let (server, list_id) = server_with_list().await;
        let gate = Arc::new(Semaphore::new(0));
        let transport = ScriptedTransport::gated(&server, gate.clone());
        let client = client_with(list_id, transport.clone(), test_config());

        let first = tokio::spawn({
            let client = client.clone();
            async move { client.sync().await }
        });
        eventually(|| transport.calls() == 1).await;
        assert!(client.status().syncing);

        assert_eq!(client.sync().await.unwrap(), SyncOutcome::Skipped);
        assert_eq!(transport.calls(), 1);

        gate.add_permits(1);
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome, SyncOutcome::Completed { rounds: 1, dirty: false });
        assert_eq!(transport.calls(), 1);
        assert!(!client.status().syncing);
    }

    #[tokio::test]
    async fn flush_waits_out_sync_in_flight() {
        let (server, list_id) = server_with_list().await;
        let gate = Arc::new(Semaphore::new(0));
        let transport = ScriptedTransport::gated(&server, gate.clone());
        let client = client_with(list_id, transport.clone(), test_config());

        let first = tokio::spawn({
            let client = client.clone();
            async move { client.sync().await }
        });
        eventually(|| transport.calls() == 1).await;

        let flushed = tokio::spawn({
            let client = client.clone();
            async move { client.flush().await }
        });
        gate.add_permits(2);

        first.await.unwrap().unwrap();
        let outcome = flushed.await.unwrap().unwrap();
        assert_eq!(outcome, SyncOutcome::Completed { rounds: 1, dirty: false });
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn zero_debounce_waits_for_sync_in_flight() {
        let (server, list_id) = server_with_list().await;
        let gate = Arc::new(Semaphore::new(0));
        let transport = ScriptedTransport::gated(&server, gate.clone());
        let config = SyncConfig {
            debounce: Duration::ZERO,
            ..test_config()
        };
        let client = client_with(list_id, transport.clone(), config);

        let first = tokio::spawn({
            let client = client.clone();
            async move { client.sync().await }
        });
        eventually(|| transport.calls() == 1).await;

        client.create_item(LocalItem::new("Eggs")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(client.shared.sync_generation.load(Ordering::Acquire) < 10);
        assert_eq!(transport.calls(), 1);

        gate.add_permits(10);
        first.await.unwrap().unwrap();
        eventually(|| {
            let status = client.status();
            !status.dirty && !status.syncing
        })
        .await;

        let remote = server.snapshot(&list_id).await.unwrap();
        assert_eq!(item_names(&remote.list), vec!["Eggs"]);
        assert!(transport.calls() <= 4);
    }

    #[tokio::test]
    async fn edits_during_round_trip_are_persisted_in_order() {
        let (server, list_id) = server_with_list().await;
        let store = MemoryClientStore::new();
        let gate = Arc::new(Semaphore::new(0));
        let transport = ScriptedTransport::gated(&server, gate.clone());
        let client =
            SyncOrchestrator::open(list_id, test_config(), transport.clone(), store.clone())
                .unwrap();

        let first = tokio::spawn({
            let client = client.clone();
            async move { client.sync().await }
        });
        eventually(|| transport.calls() == 1).await;

        client.create_item(LocalItem::new("Milk")).await.unwrap();
        client.update_title("Weekend").await.unwrap();
        assert_eq!(store.load(&list_id).unwrap(), Some(client.state().await));

        gate.add_permits(10);
        first.await.unwrap().unwrap();

        let persisted = store.load(&list_id).unwrap().unwrap();
        assert_eq!(persisted, client.state().await);
        assert_eq!(item_names(&persisted.current_local), vec!["Milk"]);
        assert_eq!(persisted.current_local.title, "Weekend");
    }

    #[tokio::test]
    async fn initial_sync_keeps_offline_edits() {
        let (server, list_id) = server_with_list().await;
        let transport = ScriptedTransport::new(&server);
        let client = client_with(list_id, transport.clone(), test_config());

        client.create_item(LocalItem::new("Eggs")).await.unwrap();
        let outcome = client.sync().await.unwrap();

        assert_eq!(outcome, SyncOutcome::Completed { rounds: 2, dirty: false });
        let remote = server.snapshot(&list_id).await.unwrap();
        assert_eq!(item_names(&remote.list), vec!["Eggs"]);
        assert_eq!(client.state().await.previous_sync, Some(remote));
    }

    #[tokio::test]
    async fn conflicting_edits_converge_within_two_rounds() {
        let (server, list_id) = server_with_list().await;
        let (alice, _) = synced_client(&server, list_id).await;
        let eggs = alice.create_item(LocalItem::new("Eggs")).await.unwrap();
        alice.sync().await.unwrap();
        let (bob, _) = synced_client(&server, list_id).await;

        alice
            .update_item(&eggs.id, LocalItem::new("Eggs").with_quantity("6"))
            .await
            .unwrap();
        bob.update_item(&eggs.id, LocalItem::new("Eggs").with_quantity("12"))
            .await
            .unwrap();

        assert_eq!(
            alice.sync().await.unwrap(),
            SyncOutcome::Completed { rounds: 1, dirty: false }
        );
        assert_eq!(
            bob.sync().await.unwrap(),
            SyncOutcome::Completed { rounds: 2, dirty: false }
        );

        let remote = server.snapshot(&list_id).await.unwrap();
        assert_eq!(remote.list.items[0].quantity.as_deref(), Some("6"));
        assert_eq!(alice.current_list().await, remote.list);
        assert_eq!(bob.current_list().await, remote.list);
        assert!(!bob.state().await.dirty);
    }

    #[tokio::test]
    async fn edits_during_round_trip_are_folded_in() {
        let (server, list_id) = server_with_list().await;
        let gate = Arc::new(Semaphore::new(1));
        let transport = ScriptedTransport::gated(&server, gate.clone());
        let client = client_with(list_id, transport.clone(), test_config());
        client.sync().await.unwrap();

        client.create_item(LocalItem::new("Milk")).await.unwrap();
        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.sync().await }
        });
        eventually(|| transport.calls() == 2).await;
        client.create_item(LocalItem::new("Eggs")).await.unwrap();
        gate.add_permits(2);

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, SyncOutcome::Completed { rounds: 2, dirty: false });

        let remote = server.snapshot(&list_id).await.unwrap();
        assert_eq!(item_names(&remote.list), vec!["Milk", "Eggs"]);
        assert_eq!(client.current_list().await, remote.list);
    }

    #[tokio::test]
    async fn debounce_collapses_bursts_of_edits() {
        let (server, list_id) = server_with_list().await;
        let transport = ScriptedTransport::new(&server);
        let config = SyncConfig {
            debounce: Duration::from_millis(30),
            ..test_config()
        };
        let client = client_with(list_id, transport.clone(), config);
        client.sync().await.unwrap();

        for name in ["Milk", "Eggs", "Bread"] {
            client.create_item(LocalItem::new(name)).await.unwrap();
        }
        eventually(|| transport.calls() == 2).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(transport.calls(), 2);
        let remote = server.snapshot(&list_id).await.unwrap();
        assert_eq!(item_names(&remote.list), vec!["Milk", "Eggs", "Bread"]);
        assert!(!client.status().dirty);
    }

    #[tokio::test]
    async fn network_failure_keeps_local_state() {
        let (server, list_id) = server_with_list().await;
        let (client, transport) = synced_client(&server, list_id).await;
        client.create_item(LocalItem::new("Milk")).await.unwrap();
        let before = client.state().await;

        transport.fail.store(true, Ordering::SeqCst);
        let err = client.sync().await.unwrap_err();
        assert!(err.is_network_failure());

        let status = client.status();
        assert!(status.last_sync_failed);
        assert!(status.last_error.is_some());
        assert!(!status.syncing);
        assert_eq!(client.state().await, before);

        transport.fail.store(false, Ordering::SeqCst);
        client.sync().await.unwrap();
        assert!(!client.status().last_sync_failed);
        assert!(!client.state().await.dirty);
    }

    #[tokio::test]
    async fn malformed_response_is_not_applied() {
        let (server, list_id) = server_with_list().await;
        let other = server.create_list("Other").await.unwrap();
        let transport = ForeignListTransport {
            server: server.clone(),
            other: other.id(),
        };
        let client =
            SyncOrchestrator::open(list_id, test_config(), transport, MemoryClientStore::new())
                .unwrap();

        let err = client.sync().await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
        assert_eq!(client.state().await, ClientSyncState::new(list_id));
        assert!(client.status().last_sync_failed);
    }

    #[tokio::test]
    async fn deletes_remember_last_ten_fingerprints() {
        let (server, list_id) = server_with_list().await;
        let (client, _) = synced_client(&server, list_id).await;

        let mut ids = Vec::new();
        for index in 0..15 {
            let item = client
                .create_item(LocalItem::new(format!("item {index}")))
                .await
                .unwrap();
            ids.push(item.id);
        }
        for id in &ids {
            client.delete_item(id).await.unwrap();
        }

        let state = client.state().await;
        let expected = (5..15).map(|index| format!("item {index}")).collect::<Vec<_>>();
        assert_eq!(
            state.recently_deleted.iter().map(str::to_string).collect::<Vec<_>>(),
            expected
        );

        client.create_item(LocalItem::new("item 14")).await.unwrap();
        assert_eq!(client.state().await.recently_deleted.len(), 9);
    }

    #[tokio::test]
    async fn edits_to_unknown_items_are_rejected() {
        let (server, list_id) = server_with_list().await;
        let (client, _) = synced_client(&server, list_id).await;

        let missing = ItemId::new();
        assert!(matches!(
            client.update_item(&missing, LocalItem::new("Milk")).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            client.delete_item(&missing).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            client.create_item(LocalItem::new("  ")).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(!client.state().await.dirty);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let (server, list_id) = server_with_list().await;
        let store = MemoryClientStore::new();
        let client = SyncOrchestrator::open(
            list_id,
            test_config(),
            ScriptedTransport::new(&server),
            store.clone(),
        )
        .unwrap();
        client.sync().await.unwrap();
        client.create_item(LocalItem::new("Milk")).await.unwrap();
        client.update_title("Weekend").await.unwrap();

        let reopened = SyncOrchestrator::open(
            list_id,
            test_config(),
            ScriptedTransport::new(&server),
            store,
        )
        .unwrap();
        assert_eq!(reopened.state().await, client.state().await);
        assert!(reopened.status().dirty);
    }

    #[tokio::test]
    async fn clear_local_state_refetches_from_server() {
        let (server, list_id) = server_with_list().await;
        let store = MemoryClientStore::new();
        let client = SyncOrchestrator::open(
            list_id,
            test_config(),
            ScriptedTransport::new(&server),
            store.clone(),
        )
        .unwrap();
        client.create_item(LocalItem::new("Milk")).await.unwrap();
        client.sync().await.unwrap();

        client.clear_local_state().await.unwrap();
        assert_eq!(client.state().await, ClientSyncState::new(list_id));
        assert_eq!(store.load(&list_id).unwrap(), None);

        client.sync().await.unwrap();
        assert_eq!(item_names(&client.current_list().await), vec!["Milk"]);
        assert_eq!(
            client
                .completions()
                .await
                .into_iter()
                .map(|completion| completion.name)
                .collect::<Vec<_>>(),
            vec!["Milk"]
        );
    }

    #[tokio::test]
    async fn notification_with_held_token_is_ignored() {
        let (server, list_id) = server_with_list().await;
        let (client, transport) = synced_client(&server, list_id).await;
        let held = server.snapshot(&list_id).await.unwrap().token;

        client.handle_notification(held);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn notification_with_new_token_triggers_sync() {
        let (server, list_id) = server_with_list().await;
        let (alice, _) = synced_client(&server, list_id).await;
        let (bob, transport) = synced_client(&server, list_id).await;

        alice.create_item(LocalItem::new("Tea")).await.unwrap();
        alice.sync().await.unwrap();
        let token = server.snapshot(&list_id).await.unwrap().token;

        bob.handle_notification(token);
        eventually(|| transport.calls() == 2).await;
        eventually(|| !bob.status().syncing).await;
        assert_eq!(item_names(&bob.current_list().await), vec!["Tea"]);
    }

    #[tokio::test]
    async fn connection_loop_uses_push_channel() {
        let (server, list_id) = server_with_list().await;
        let (alice, _) = synced_client(&server, list_id).await;
        let bob = client_with(list_id, ScriptedTransport::new(&server), test_config());

        bob.start(
            InProcessChannel::new(server.clone()),
            InProcessTransport::new(server.clone()),
        );
        eventually(|| bob.status().connection == ConnectionState::Socket).await;

        alice.create_item(LocalItem::new("Coffee")).await.unwrap();
        alice.sync().await.unwrap();
        let expected = server.snapshot(&list_id).await.unwrap();
        for _ in 0..400 {
            if bob.state().await.previous_sync.as_ref() == Some(&expected) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(bob.current_list().await, expected.list);

        bob.shutdown();
        assert_eq!(bob.status().connection, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn connection_loop_falls_back_to_polling_and_offline() {
        let (server, list_id) = server_with_list().await;
        let client = client_with(list_id, ScriptedTransport::new(&server), test_config());
        let online = Arc::new(AtomicBool::new(true));

        client.start(ClosedChannel, ManualProbe(online.clone()));
        eventually(|| client.status().connection == ConnectionState::Polling).await;

        online.store(false, Ordering::SeqCst);
        client.handle_offline();
        eventually(|| client.status().connection == ConnectionState::Disconnected).await;

        online.store(true, Ordering::SeqCst);
        client.handle_online();
        eventually(|| client.status().connection == ConnectionState::Polling).await;
        client.shutdown();
    }
}
