//! One live reload client and its read/write loops.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::hub::{ConnectionId, HubHandle, MAILBOX_CAPACITY, Registration};

/// A client channel registered with the hub.
///
/// Created with [`Connection::open`], then driven by [`Connection::run`]
/// until the peer goes away or the hub releases it.
pub struct Connection {
    id: ConnectionId,
    mailbox: mpsc::Receiver<Arc<str>>,
    released: CancellationToken,
    hub: HubHandle,
}

impl Connection {
    /// Create a connection and register its mailbox with the hub.
    pub fn open(hub: &HubHandle) -> Self {
        let id = Uuid::new_v4();
        let (mailbox_tx, mailbox) = mpsc::channel(MAILBOX_CAPACITY);
        let released = CancellationToken::new();

        hub.register(Registration {
            id,
            mailbox: mailbox_tx,
            released: released.clone(),
        });

        Self {
            id,
            mailbox,
            released,
            hub: hub.clone(),
        }
    }

    /// Connection identity.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Pump messages between the hub and the transport.
    ///
    /// The outbound loop runs on its own task; the inbound loop runs on the
    /// caller's. Returns once both have finished and the connection has been
    /// unregistered.
    pub async fn run<Si, St, E>(self, sink: Si, stream: St)
    where
        Si: Sink<Message> + Unpin + Send + 'static,
        Si::Error: Display,
        St: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let Self {
            id,
            mailbox,
            released,
            hub,
        } = self;

        let writer = tokio::spawn(write_loop(id, mailbox, sink, hub.clone()));
        read_loop(id, stream, &released).await;
        hub.unregister(id);

        // The writer drains what is queued once the hub drops the mailbox sender
        if let Err(err) = writer.await {
            tracing::warn!(connection_id = %id, error = %err, "Live reload writer task failed");
        }
    }
}

/// Forward mailbox messages to the transport in order.
async fn write_loop<Si>(
    id: ConnectionId,
    mut mailbox: mpsc::Receiver<Arc<str>>,
    mut sink: Si,
    hub: HubHandle,
) where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    while let Some(message) = mailbox.recv().await {
        if let Err(err) = sink.send(Message::Text(message.to_string().into())).await {
            tracing::info!(connection_id = %id, error = %err, "Live reload write failed");
            break;
        }
    }

    hub.unregister(id);
    if let Err(err) = sink.close().await {
        tracing::debug!(connection_id = %id, error = %err, "Live reload close failed");
    }
}

/// Read until the peer closes, the transport fails, or the hub releases us.
///
/// Incoming frames are only keepalive traffic and are discarded.
async fn read_loop<St, E>(id: ConnectionId, mut stream: St, released: &CancellationToken)
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let frame = tokio::select! {
            () = released.cancelled() => return,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Close(_))) | None => {
                tracing::debug!(connection_id = %id, "Live reload client closed connection");
                return;
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                tracing::info!(connection_id = %id, error = %err, "Live reload read failed");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures::channel::mpsc as chan;
    use pretty_assertions::assert_eq;
    use tokio::task::JoinHandle;

    use crate::live_reload::hub::Hub;

    type Inbound = chan::UnboundedSender<Result<Message, std::io::Error>>;
    type Outbound = chan::UnboundedReceiver<Message>;

    fn spawn_hub() -> (HubHandle, CancellationToken) {
        let (hub, handle) = Hub::new();
        let cancel = CancellationToken::new();
        tokio::spawn(hub.run(cancel.clone()));
        (handle, cancel)
    }

    fn spawn_connection(hub: &HubHandle) -> (Inbound, Outbound, JoinHandle<()>) {
        let (sink, outbound) = chan::unbounded::<Message>();
        let (inbound, stream) = chan::unbounded::<Result<Message, std::io::Error>>();
        let connection = Connection::open(hub);
        let task = tokio::spawn(connection.run(sink, stream));
        (inbound, outbound, task)
    }

    async fn finish(task: JoinHandle<()>) {
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("connection did not finish")
            .unwrap();
    }

    #[tokio::test]
    async fn test_messages_written_in_order() {
        let (hub, _cancel) = spawn_hub();
        let (_inbound, mut outbound, _task) = spawn_connection(&hub);

        hub.broadcast("one");
        hub.broadcast("two");
        hub.broadcast("three");

        for expected in ["one", "two", "three"] {
            assert_eq!(
                outbound.next().await,
                Some(Message::Text(expected.to_owned().into()))
            );
        }
    }

    #[tokio::test]
    async fn test_keepalive_frames_are_ignored() {
        let (hub, _cancel) = spawn_hub();
        let (inbound, mut outbound, _task) = spawn_connection(&hub);

        inbound
            .unbounded_send(Ok(Message::Text("ping".to_owned().into())))
            .unwrap();
        hub.broadcast("reload");

        assert_eq!(
            outbound.next().await,
            Some(Message::Text("reload".to_owned().into()))
        );
        assert_eq!(hub.connection_count().await, Some(1));
    }

    #[tokio::test]
    async fn test_peer_close_unregisters() {
        let (hub, _cancel) = spawn_hub();
        let (inbound, mut outbound, task) = spawn_connection(&hub);
        assert_eq!(hub.connection_count().await, Some(1));

        inbound.unbounded_send(Ok(Message::Close(None))).unwrap();
        finish(task).await;

        assert_eq!(hub.connection_count().await, Some(0));
        // Sink was closed by the writer
        assert_eq!(outbound.next().await, None);
    }

    #[tokio::test]
    async fn test_end_of_stream_unregisters() {
        let (hub, _cancel) = spawn_hub();
        let (inbound, _outbound, task) = spawn_connection(&hub);

        drop(inbound);
        finish(task).await;

        assert_eq!(hub.connection_count().await, Some(0));
    }

    #[tokio::test]
    async fn test_read_error_unregisters() {
        let (hub, _cancel) = spawn_hub();
        let (inbound, _outbound, task) = spawn_connection(&hub);

        inbound
            .unbounded_send(Err(std::io::Error::other("connection reset")))
            .unwrap();
        finish(task).await;

        assert_eq!(hub.connection_count().await, Some(0));
    }

    #[tokio::test]
    async fn test_write_failure_unregisters() {
        let (hub, _cancel) = spawn_hub();
        let (_inbound, outbound, task) = spawn_connection(&hub);
        assert_eq!(hub.connection_count().await, Some(1));

        drop(outbound);
        hub.broadcast("reload");
        finish(task).await;

        assert_eq!(hub.connection_count().await, Some(0));
    }

    #[tokio::test]
    async fn test_hub_shutdown_releases_connection() {
        let (hub, cancel) = spawn_hub();
        let (_inbound, mut outbound, task) = spawn_connection(&hub);
        assert_eq!(hub.connection_count().await, Some(1));

        cancel.cancel();
        finish(task).await;

        assert_eq!(outbound.next().await, None);
    }

    #[tokio::test]
    async fn test_open_on_stopped_hub_finishes() {
        let (hub, handle) = Hub::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        hub.run(cancel).await;

        // Idle peer: only the release can end the inbound loop
        let (_inbound, mut outbound, task) = spawn_connection(&handle);
        finish(task).await;

        assert_eq!(outbound.next().await, None);
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let (hub, _cancel) = spawn_hub();
        let a = Connection::open(&hub);
        let b = Connection::open(&hub);

        assert_ne!(a.id(), b.id());
        assert_eq!(hub.connection_count().await, Some(2));
    }
}
