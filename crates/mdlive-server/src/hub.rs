//! Broadcast hub owning the set of live-reload connections.
//!
//! All access to the client set goes through one tokio task. Other tasks only
//! hold a [`HubHandle`] and send it intents over a channel, so registration,
//! removal and fan-out never run concurrently with each other.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{mpsc, oneshot};

/// Identifier assigned to a connection when it is registered.
pub type ClientId = u64;

/// Default bound on a single write to one client.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages pushed to live-reload clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveMessage {
    /// Full page reload
    Reload,
}

impl LiveMessage {
    /// Wire form of the message.
    pub fn as_str(&self) -> &'static str {
        match self {
            LiveMessage::Reload => "reload",
        }
    }
}

/// Errors writing to a single client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("write failed: {0}")]
    Write(String),

    #[error("write timed out after {0:?}")]
    Timeout(Duration),
}

/// Write side of one connected client.
pub trait Client: Send + 'static {
    /// Send one text payload.
    fn send(&mut self, payload: &str) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Close the connection.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Something that can be told the page should reload.
pub trait ReloadNotifier: Send + Sync {
    fn notify_reload(&self);
}

enum Intent<C> {
    Register(ClientId, C),
    Unregister(ClientId),
    Broadcast(String),
    Clients(oneshot::Sender<Vec<ClientId>>),
}

/// Cloneable handle to a running hub.
///
/// The hub task stops once every handle is dropped, closing any clients that
/// are still registered.
pub struct HubHandle<C> {
    tx: mpsc::UnboundedSender<Intent<C>>,
    next_id: Arc<AtomicU64>,
}

impl<C> Clone for HubHandle<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<C: Client> HubHandle<C> {
    /// Spawn the hub task on the current tokio runtime.
    pub fn spawn(write_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let hub = Hub {
            clients: HashMap::new(),
            rx,
            write_timeout,
        };
        tokio::spawn(hub.run());

        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Hand a client over to the hub. It receives every broadcast queued
    /// after this call.
    pub fn register(&self, client: C) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(Intent::Register(id, client));
        id
    }

    /// Remove and close a client. Unknown ids are ignored.
    pub fn unregister(&self, id: ClientId) {
        let _ = self.tx.send(Intent::Unregister(id));
    }

    /// Send a payload to every registered client.
    pub fn broadcast(&self, payload: impl Into<String>) {
        let _ = self.tx.send(Intent::Broadcast(payload.into()));
    }

    /// Snapshot of the ids currently registered.
    pub async fn clients(&self) -> Vec<ClientId> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Intent::Clients(reply)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

impl<C: Client> ReloadNotifier for HubHandle<C> {
    fn notify_reload(&self) {
        self.broadcast(LiveMessage::Reload.as_str());
    }
}

struct Hub<C> {
    clients: HashMap<ClientId, C>,
    rx: mpsc::UnboundedReceiver<Intent<C>>,
    write_timeout: Duration,
}

impl<C: Client> Hub<C> {
    async fn run(mut self) {
        while let Some(intent) = self.rx.recv().await {
            match intent {
                Intent::Register(id, client) => {
                    self.clients.insert(id, client);
                    tracing::debug!(client = id, total = self.clients.len(), "client registered");
                }
                Intent::Unregister(id) => {
                    if let Some(client) = self.clients.remove(&id) {
                        close_client(self.write_timeout, client).await;
                        tracing::debug!(
                            client = id,
                            total = self.clients.len(),
                            "client unregistered"
                        );
                    }
                }
                Intent::Broadcast(payload) => self.broadcast(&payload).await,
                Intent::Clients(reply) => {
                    let mut ids: Vec<ClientId> = self.clients.keys().copied().collect();
                    ids.sort_unstable();
                    let _ = reply.send(ids);
                }
            }
        }

        for (_, client) in self.clients.drain() {
            close_client(self.write_timeout, client).await;
        }
        tracing::debug!("hub stopped");
    }

    async fn broadcast(&mut self, payload: &str) {
        if self.clients.is_empty() {
            tracing::debug!("no clients connected");
            return;
        }

        let timeout = self.write_timeout;
        let mut writes = Vec::with_capacity(self.clients.len());
        for (&id, client) in self.clients.iter_mut() {
            writes.push(async move {
                let result = match tokio::time::timeout(timeout, client.send(payload)).await {
                    Ok(result) => result,
                    Err(_) => Err(ClientError::Timeout(timeout)),
                };
                (id, result)
            });
        }

        let mut dropped = Vec::new();
        for (id, result) in join_all(writes).await {
            if let Err(e) = result {
                tracing::debug!(client = id, error = %e, "client write failed, removing");
                dropped.push(id);
            }
        }

        for id in &dropped {
            if let Some(client) = self.clients.remove(id) {
                close_client(self.write_timeout, client).await;
            }
        }

        tracing::debug!(
            delivered = self.clients.len(),
            dropped = dropped.len(),
            "broadcast {}",
            payload
        );
    }
}

/// Close a client, giving up after `timeout`. Must not borrow the hub, or
/// `Hub::run` stops being `Send` for clients that are not `Sync`.
async fn close_client<C: Client>(timeout: Duration, client: C) {
    let _ = tokio::time::timeout(timeout, client.close()).await;
}
