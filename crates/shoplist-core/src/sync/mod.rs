//! Client side of list synchronization.
//!
//! - [`transport`]: request/response calls into the sync server
//! - [`channel`]: push notifications of new tokens
//! - [`local_store`]: durable client state
//! - [`orchestrator`]: debounced, single-flight sync driving all of the above

pub mod channel;
pub mod local_store;
pub mod orchestrator;
pub mod transport;

pub use channel::{InProcessChannel, NotificationChannel, TokenStream, WebSocketChannel};
pub use local_store::{ClientStore, JsonClientStore, MemoryClientStore};
pub use orchestrator::{SyncOrchestrator, SyncOutcome};
pub use transport::{ConnectivityProbe, HttpSyncClient, InProcessTransport, SyncTransport};
