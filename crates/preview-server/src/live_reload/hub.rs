//! Connection registry and broadcast fan-out.
//!
//! The [`Hub`] owns the set of live connections. Every register, unregister
//! and broadcast request goes through a single queue drained by
//! [`Hub::run`], so the registry is only ever touched by one task and needs
//! no lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity of a registered connection.
pub type ConnectionId = Uuid;

/// Capacity of each connection's outbound mailbox.
pub(crate) const MAILBOX_CAPACITY: usize = 256;

/// Hub-side half of a connection.
pub(crate) struct Registration {
    pub(crate) id: ConnectionId,
    pub(crate) mailbox: mpsc::Sender<Arc<str>>,
    pub(crate) released: CancellationToken,
}

impl Registration {
    /// Release the connection's transport.
    ///
    /// Consuming `self` drops the mailbox sender, which ends the outbound
    /// loop; the token ends the inbound loop.
    fn release(self) {
        self.released.cancel();
    }
}

/// Request processed by the hub loop.
pub(crate) enum HubRequest {
    Register(Registration),
    Unregister(ConnectionId),
    Broadcast(Arc<str>),
    ConnectionCount(oneshot::Sender<usize>),
}

/// Cloneable handle for sending requests to a running [`Hub`].
///
/// Every method returns immediately. Requests are applied by the hub loop in
/// the order they were sent.
#[derive(Clone, Debug)]
pub struct HubHandle {
    requests: mpsc::UnboundedSender<HubRequest>,
}

impl HubHandle {
    pub(crate) fn register(&self, registration: Registration) {
        self.send(HubRequest::Register(registration));
    }

    /// Remove a connection and release its transport.
    ///
    /// Unknown or already removed ids are ignored.
    pub fn unregister(&self, id: ConnectionId) {
        self.send(HubRequest::Unregister(id));
    }

    /// Queue `message` for every registered connection.
    pub fn broadcast(&self, message: impl Into<Arc<str>>) {
        self.send(HubRequest::Broadcast(message.into()));
    }

    /// Number of registered connections, or `None` if the hub has stopped.
    pub async fn connection_count(&self) -> Option<usize> {
        let (tx, rx) = oneshot::channel();
        self.send(HubRequest::ConnectionCount(tx));
        rx.await.ok()
    }

    fn send(&self, request: HubRequest) {
        let Err(mpsc::error::SendError(request)) = self.requests.send(request) else {
            return;
        };
        tracing::debug!("Live reload hub stopped, dropping request");
        // Nobody else will ever release it
        if let HubRequest::Register(registration) = request {
            registration.release();
        }
    }

    /// Handle whose requests are delivered to the returned receiver instead of a hub.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<HubRequest>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, rx)
    }
}

/// Registry of live reload connections.
pub struct Hub {
    connections: HashMap<ConnectionId, Registration>,
    requests: mpsc::UnboundedReceiver<HubRequest>,
}

impl Hub {
    /// Create a hub and the handle used to talk to it.
    ///
    /// Nothing happens until [`Hub::run`] is polled.
    #[must_use]
    pub fn new() -> (Self, HubHandle) {
        let (requests, rx) = mpsc::unbounded_channel();
        let hub = Self {
            connections: HashMap::new(),
            requests: rx,
        };
        (hub, HubHandle { requests })
    }

    /// Process requests until `cancel` fires or every handle is dropped.
    ///
    /// Connections still registered on exit are released.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let request = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                request = self.requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            self.handle(request);
        }

        let remaining = self.connections.len();
        for (_, registration) in self.connections.drain() {
            registration.release();
        }
        tracing::debug!(released = remaining, "Live reload hub stopped");
    }

    fn handle(&mut self, request: HubRequest) {
        match request {
            HubRequest::Register(registration) => self.register(registration),
            HubRequest::Unregister(id) => self.unregister(id),
            HubRequest::Broadcast(message) => self.broadcast(&message),
            HubRequest::ConnectionCount(reply) => {
                let _ = reply.send(self.connections.len());
            }
        }
    }

    fn register(&mut self, registration: Registration) {
        let id = registration.id;
        if let Some(previous) = self.connections.insert(id, registration) {
            previous.release();
        }
        tracing::info!(
            connection_id = %id,
            total_connections = self.connections.len(),
            "Live reload client connected"
        );
    }

    fn unregister(&mut self, id: ConnectionId) {
        let Some(registration) = self.connections.remove(&id) else {
            return;
        };
        registration.release();
        tracing::info!(
            connection_id = %id,
            total_connections = self.connections.len(),
            "Live reload client disconnected"
        );
    }

    /// Offer `message` to every mailbox without waiting.
    ///
    /// A connection whose mailbox is full or closed is treated as dead and
    /// dropped, so one stalled client can never hold up the others.
    fn broadcast(&mut self, message: &Arc<str>) {
        tracing::info!(
            message = %message,
            connections = self.connections.len(),
            "Broadcasting reload"
        );

        let mut dropped = Vec::new();
        self.connections.retain(|id, registration| {
            if registration.mailbox.try_send(Arc::clone(message)).is_ok() {
                return true;
            }
            registration.released.cancel();
            dropped.push(*id);
            false
        });

        for id in dropped {
            tracing::info!(
                connection_id = %id,
                total_connections = self.connections.len(),
                "Dropped unresponsive live reload client"
            );
        }
    }
}
