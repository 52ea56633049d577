//! Coalescing of resource changes into reload broadcasts.
//!
//! Bursts of changes (an editor saving several files, a generator rewriting
//! a directory) collapse into a single reload once the stream has been
//! quiet for [`QUIET_WINDOW`]. The broadcast always describes the most
//! recent change.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::event::{ReloadCommand, ResourceChange};
use super::hub::HubHandle;

/// Silence required after the last change before a reload fires.
pub const QUIET_WINDOW: Duration = Duration::from_millis(200);

/// Capacity of the change intake queue.
pub(crate) const INTAKE_CAPACITY: usize = 128;

/// Cloneable, non-blocking entry point for resource changes.
#[derive(Clone, Debug)]
pub struct ReloadSender {
    changes: mpsc::Sender<ResourceChange>,
}

impl ReloadSender {
    /// Submit a change without waiting.
    ///
    /// When the intake queue is full the change is dropped: a reload is
    /// already pending and will fire after the burst settles.
    pub fn submit(&self, change: ResourceChange) {
        match self.changes.try_send(change) {
            Ok(()) => {}
            Err(TrySendError::Full(change)) => {
                tracing::debug!(uid = change.uid(), "Reload already pending, dropping change");
            }
            Err(TrySendError::Closed(change)) => {
                tracing::debug!(uid = change.uid(), "Reload coordinator stopped, dropping change");
            }
        }
    }
}

/// Changes absorbed into one pending reload.
#[derive(Debug)]
pub(crate) struct ReloadBatch {
    pub(crate) last: ResourceChange,
    pub(crate) coalesced: usize,
}

impl ReloadBatch {
    fn new(first: ResourceChange) -> Self {
        Self {
            last: first,
            coalesced: 1,
        }
    }

    fn absorb(&mut self, change: ResourceChange) {
        self.last = change;
        self.coalesced += 1;
    }
}

/// Debounce loop feeding the hub.
pub struct Debouncer {
    changes: mpsc::Receiver<ResourceChange>,
    window: Duration,
    hub: HubHandle,
}

impl Debouncer {
    /// Create a debouncer with the default [`QUIET_WINDOW`].
    #[must_use]
    pub fn new(hub: HubHandle) -> (Self, ReloadSender) {
        Self::with_window(hub, QUIET_WINDOW)
    }

    /// Create a debouncer with a custom quiet window.
    #[must_use]
    pub fn with_window(hub: HubHandle, window: Duration) -> (Self, ReloadSender) {
        let (changes_tx, changes) = mpsc::channel(INTAKE_CAPACITY);
        let debouncer = Self {
            changes,
            window,
            hub,
        };
        (debouncer, ReloadSender { changes: changes_tx })
    }

    /// Broadcast one reload per settled burst until `cancel` fires.
    ///
    /// Also stops once every [`ReloadSender`] is gone, after flushing any
    /// pending batch.
    pub async fn run(mut self, cancel: CancellationToken) {
        while let Some(batch) = self.next_batch(&cancel).await {
            self.flush(&batch);
        }
        tracing::debug!("Reload coordinator stopped");
    }

    /// Wait for the next settled batch.
    ///
    /// Idle: waits for a first change. Pending: each new change replaces
    /// `last` and pushes the deadline back by a full window. The single
    /// timer is reset in place, so a window can expire at most once.
    async fn next_batch(&mut self, cancel: &CancellationToken) -> Option<ReloadBatch> {
        let first = tokio::select! {
            biased;
            () = cancel.cancelled() => return None,
            change = self.changes.recv() => change?,
        };

        let mut batch = ReloadBatch::new(first);
        let quiet = tokio::time::sleep(self.window);
        tokio::pin!(quiet);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                change = self.changes.recv() => match change {
                    Some(change) => {
                        batch.absorb(change);
                        quiet.as_mut().reset(Instant::now() + self.window);
                    }
                    None => return Some(batch),
                },
                () = &mut quiet => return Some(batch),
            }
        }
    }

    fn flush(&self, batch: &ReloadBatch) {
        let change = &batch.last;
        let payload = match serde_json::to_string(&ReloadCommand::for_resource(change)) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(uid = change.uid(), error = %err, "Failed to serialize reload command");
                return;
            }
        };

        if batch.coalesced > 1 {
            tracing::info!(
                changes = batch.coalesced,
                resource = change.name(),
                uid = change.uid(),
                kind = change.kind(),
                "Coalesced resource changes, triggering reload"
            );
        } else {
            tracing::info!(
                resource = change.name(),
                uid = change.uid(),
                kind = change.kind(),
                "Resource changed, triggering reload"
            );
        }

        self.hub.broadcast(payload);
    }
}
