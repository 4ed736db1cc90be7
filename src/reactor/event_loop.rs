//! Tokio-backed reactor

use super::{ConnectionId, Dispatch, Interest, Reactor};
use crate::connection::Connection;
use crate::{Error, Result};
use std::collections::HashMap;
use std::os::fd::RawFd;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Reactor that drives each registered connection on its own tokio task.
///
/// The task waits for the socket to become readable, then calls
/// [`Connection::on_readiness`] with the connection's read size. It stops as
/// soon as the connection tears itself down or is unregistered.
///
/// Only [`Interest::Readable`] is dispatched; connections are always
/// registered with that interest.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> connsock::Result<()> {
/// use connsock::{Connection, ConnectionConfig, EventLoop};
///
/// let event_loop = EventLoop::new();
/// let mut conn = Connection::connect("localhost", 7u16, &ConnectionConfig::default()).await?;
/// conn.on_data(|data: Option<bytes::Bytes>| data.is_some());
/// let task = event_loop.spawn(conn)?;
/// task.await.ok();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct EventLoop {
    registrations: Mutex<HashMap<ConnectionId, Registration>>,
}

#[derive(Debug)]
struct Registration {
    fd: RawFd,
    interest: Interest,
    cancel: Arc<Notify>,
}

impl EventLoop {
    /// Create an empty event loop
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `conn` and drive it until it closes or is unregistered
    pub fn spawn(self: &Arc<Self>, mut conn: Connection) -> Result<JoinHandle<()>> {
        conn.attach(self, Interest::Readable)?;

        let id = conn.id();
        let this = Arc::clone(self);
        let task = async move { this.drive(conn).await }
            .instrument(tracing::debug_span!("event_loop", %id));
        Ok(tokio::spawn(task))
    }

    async fn drive(&self, mut conn: Connection) {
        let id = conn.id();
        let chunk = conn.read_chunk_size();
        let secure = conn.is_secure();

        while let Some(cancel) = self.cancel_signal(id) {
            tokio::select! {
                _ = cancel.notified() => break,
                outcome = dispatch_once(&mut conn, chunk, secure) => {
                    if outcome == Dispatch::Closed {
                        break;
                    }
                }
            }
        }

        // Unregistered externally: release the socket too
        conn.close();
        tracing::debug!(%id, "event loop finished");
    }

    /// Whether `id` is currently registered
    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Descriptor and interest registered for `id`
    pub fn registration(&self, id: ConnectionId) -> Option<(RawFd, Interest)> {
        self.lock().get(&id).map(|r| (r.fd, r.interest))
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no connection is registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Unregister every connection, stopping their tasks
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.lock().drain().collect();
        for (id, registration) in drained {
            tracing::debug!(%id, "unregistered by shutdown");
            registration.cancel.notify_one();
        }
    }

    fn cancel_signal(&self, id: ConnectionId) -> Option<Arc<Notify>> {
        self.lock().get(&id).map(|r| Arc::clone(&r.cancel))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Wait for input, then dispatch one read.
///
/// TLS sessions skip the socket readiness gate: decrypted plaintext may already
/// be buffered in the session, and the session read waits on the socket itself.
async fn dispatch_once(conn: &mut Connection, chunk: usize, secure: bool) -> Dispatch {
    if !secure {
        if let Err(e) = conn.readable().await {
            return conn.dispatch_error(e);
        }
    }
    conn.on_readiness(chunk).await
}

impl Reactor for EventLoop {
    fn register(&self, id: ConnectionId, fd: RawFd, interest: Interest) -> Result<()> {
        let mut registrations = self.lock();
        if registrations.contains_key(&id) {
            return Err(Error::Config(format!("{} is already registered", id)));
        }
        registrations.insert(
            id,
            Registration {
                fd,
                interest,
                cancel: Arc::new(Notify::new()),
            },
        );
        Ok(())
    }

    fn unregister(&self, id: ConnectionId) {
        if let Some(registration) = self.lock().remove(&id) {
            registration.cancel.notify_one();
        }
    }
}
