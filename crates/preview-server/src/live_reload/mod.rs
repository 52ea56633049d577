//! Live reload: change coalescing, connection hub, and browser channel.
//!
//! ```text
//! FileWatcher ──submit──► Debouncer ──broadcast──► Hub ──mailbox──► Connection ──► browser
//! ```
//!
//! The hub and debouncer each run as one task. Every loop takes a
//! [`CancellationToken`], so [`LiveReload::shutdown`] stops the whole
//! subsystem deterministically.

mod connection;
mod debounce;
mod event;
mod hub;
mod watcher;
mod websocket;

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use connection::Connection;
pub use debounce::{Debouncer, QUIET_WINDOW, ReloadSender};
pub use event::ResourceChange;
pub use hub::{ConnectionId, Hub, HubHandle};
pub use watcher::FileWatcher;
pub(crate) use websocket::ws_handler;

/// Running hub and debouncer, plus the handles to reach them.
pub struct LiveReload {
    hub: HubHandle,
    sender: ReloadSender,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveReload {
    /// Spawn the hub and debouncer on the current runtime.
    ///
    /// Both stop when `parent` is cancelled or [`LiveReload::shutdown`] is
    /// called.
    #[must_use]
    pub fn start(parent: &CancellationToken) -> Self {
        Self::start_with_window(parent, QUIET_WINDOW)
    }

    /// Like [`LiveReload::start`] with a custom quiet window.
    #[must_use]
    pub fn start_with_window(parent: &CancellationToken, window: Duration) -> Self {
        let cancel = parent.child_token();
        let (hub, hub_handle) = Hub::new();
        let (debouncer, sender) = Debouncer::with_window(hub_handle.clone(), window);

        let tasks = vec![
            tokio::spawn(hub.run(cancel.clone())),
            tokio::spawn(debouncer.run(cancel.clone())),
        ];

        Self {
            hub: hub_handle,
            sender,
            cancel,
            tasks,
        }
    }

    /// Handle for registering connections and broadcasting.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Entry point for resource changes.
    pub fn sender(&self) -> &ReloadSender {
        &self.sender
    }

    /// Stop the hub and debouncer and wait for both tasks.
    pub async fn shutdown(self) {
        if let Some(connections) = self.hub.connection_count().await {
            tracing::info!(connections, "Stopping live reload");
        }
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "Live reload task failed");
            }
        }
    }
}
