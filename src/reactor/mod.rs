//! Readiness-driven dispatch
//!
//! A [`Reactor`] notifies registered connections when their socket has data
//! pending. The connection side of the contract is
//! [`Connection::on_readiness`](crate::Connection::on_readiness); the reactor
//! side is register/unregister. A connection holds only a weak reference to its
//! reactor, used to unregister before its socket is released.

mod event_loop;

pub use event_loop::EventLoop;

use crate::{Error, Result};
use bytes::Bytes;
use std::fmt;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a connection within a reactor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Readiness interest
///
/// Recorded at registration. Dispatch only ever reads, so [`EventLoop`]
/// registers with `Readable`; the other values are for reactors that also
/// track write readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Data available to read
    Readable,
    /// Room to write
    Writable,
    /// Either
    ReadWrite,
}

/// Outcome of one readiness dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The connection is still open and registered
    Continue,
    /// The connection was torn down
    Closed,
}

/// A readiness-notification dispatcher
pub trait Reactor: Send + Sync {
    /// Start delivering readiness events for `fd` to connection `id`
    fn register(&self, id: ConnectionId, fd: RawFd, interest: Interest) -> Result<()>;

    /// Stop delivering events for `id`; unknown ids are ignored
    fn unregister(&self, id: ConnectionId);
}

/// Non-owning back-reference from a connection to its reactor
#[derive(Clone)]
pub struct ReactorHandle {
    id: ConnectionId,
    reactor: Weak<dyn Reactor>,
}

impl ReactorHandle {
    /// Create a handle for `id` without taking ownership of `reactor`
    pub fn new(id: ConnectionId, reactor: &Arc<dyn Reactor>) -> Self {
        Self {
            id,
            reactor: Arc::downgrade(reactor),
        }
    }

    /// Identity registered with the reactor
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Unregister; returns `false` if the reactor no longer exists
    pub fn unregister(&self) -> bool {
        match self.reactor.upgrade() {
            Some(reactor) => {
                reactor.unregister(self.id);
                true
            }
            None => {
                tracing::debug!(id = %self.id, "reactor dropped before unregister");
                false
            }
        }
    }
}

impl fmt::Debug for ReactorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactorHandle")
            .field("id", &self.id)
            .field("alive", &(self.reactor.strong_count() > 0))
            .finish()
    }
}

/// Receives data delivered by reactor dispatch
///
/// `None` means the peer closed the connection. Return `true` to stay
/// registered, `false` to tear the connection down.
pub trait DataHandler: Send {
    /// Handle one received chunk
    fn on_data(&mut self, data: Option<Bytes>) -> bool;
}

impl<F> DataHandler for F
where
    F: FnMut(Option<Bytes>) -> bool + Send,
{
    fn on_data(&mut self, data: Option<Bytes>) -> bool {
        self(data)
    }
}

/// Receives read errors raised during reactor dispatch
///
/// Return `true` to keep the connection registered despite the error.
pub trait ErrorHandler: Send {
    /// Handle one dispatch error
    fn on_error(&mut self, error: &Error) -> bool;
}

impl<F> ErrorHandler for F
where
    F: FnMut(&Error) -> bool + Send,
{
    fn on_error(&mut self, error: &Error) -> bool {
        self(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        unregistered: Mutex<Vec<ConnectionId>>,
    }

    impl Reactor for Recording {
        fn register(&self, _id: ConnectionId, _fd: RawFd, _interest: Interest) -> Result<()> {
            Ok(())
        }

        fn unregister(&self, id: ConnectionId) {
            self.unregistered.lock().unwrap().push(id);
        }
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("conn-"));
    }

    #[test]
    fn test_handle_unregisters_through_weak_reference() {
        let recording = Arc::new(Recording::default());
        let reactor: Arc<dyn Reactor> = recording.clone();
        let id = ConnectionId::next();
        let handle = ReactorHandle::new(id, &reactor);

        assert!(handle.unregister());
        assert_eq!(*recording.unregistered.lock().unwrap(), vec![id]);
    }

    #[test]
    fn test_handle_does_not_keep_reactor_alive() {
        let reactor: Arc<dyn Reactor> = Arc::new(Recording::default());
        let handle = ReactorHandle::new(ConnectionId::next(), &reactor);
        drop(reactor);

        assert!(!handle.unregister());
    }

    #[test]
    fn test_closures_are_handlers() {
        let mut data_handler = |data: Option<Bytes>| data.is_some();
        assert!(DataHandler::on_data(&mut data_handler, Some(Bytes::from_static(b"x"))));
        assert!(!DataHandler::on_data(&mut data_handler, None));

        let mut error_handler = |_: &Error| true;
        assert!(ErrorHandler::on_error(&mut error_handler, &Error::ConnectionClosed));
    }
}
