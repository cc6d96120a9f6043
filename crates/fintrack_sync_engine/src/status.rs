//! Sync state and its publisher.

use std::fmt;
use tokio::sync::watch;

/// Phase of a table's reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// No run has happened yet.
    Idle,
    /// A run is reading the outbox.
    Checking,
    /// A run is replaying entries.
    Processing,
    /// The last run replayed every entry.
    Success,
    /// The last run stopped at an unrecoverable failure.
    Error,
    /// The last run found the outbox empty.
    NoChanges,
}

impl SyncState {
    /// Returns true while a run is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Checking | SyncState::Processing)
    }

    /// Returns true for the states a run ends in.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncState::Success | SyncState::Error | SyncState::NoChanges
        )
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncState::Idle => "idle",
            SyncState::Checking => "checking",
            SyncState::Processing => "processing",
            SyncState::Success => "success",
            SyncState::Error => "error",
            SyncState::NoChanges => "no changes",
        })
    }
}

/// Current-value publisher for one table's [`SyncState`].
///
/// Delivery is last-value-wins: a receiver sees the latest state, not the
/// sequence of transitions. A receiver that is slower than the engine may
/// never observe an intermediate state such as `Checking`.
#[derive(Debug)]
pub struct StatusPublisher {
    sender: watch::Sender<SyncState>,
}

impl StatusPublisher {
    /// Creates a publisher starting at [`SyncState::Idle`].
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SyncState::Idle);
        Self { sender }
    }

    /// Overwrites the current state and wakes receivers.
    ///
    /// The value is stored even when nobody is subscribed.
    pub fn publish(&self, state: SyncState) {
        self.sender.send_replace(state);
    }

    /// Returns the current state.
    pub fn current(&self) -> SyncState {
        *self.sender.borrow()
    }

    /// Returns a receiver positioned at the current state.
    ///
    /// Use `borrow()` for polling or `changed().await` inside an async
    /// runtime.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.sender.subscribe()
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}
