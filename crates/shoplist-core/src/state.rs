//! Shared client status types.

use serde::Serialize;

/// How resyncs are currently triggered for a list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Host is offline; waiting for connectivity.
    #[default]
    Disconnected,
    /// Online without a push channel; retrying the channel on a timer.
    Polling,
    /// Push channel open.
    Socket,
}

impl ConnectionState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Polling => "polling",
            Self::Socket => "socket",
        }
    }
}

/// Observable status of one client orchestrator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub connection: ConnectionState,
    pub syncing: bool,
    pub dirty: bool,
    pub last_sync_failed: bool,
    pub last_error: Option<String>,
}
