//! connsock: a transport-agnostic client connection socket
//!
//! A [`Connection`] establishes an outbound connection (resolving a hostname and
//! service, or using a literal address), optionally upgrades it to TLS, and
//! exposes one read/write/close contract regardless of transport. Connections
//! can also be driven by a readiness [`Reactor`](reactor::Reactor) instead of
//! being read directly.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> connsock::Result<()> {
//! use connsock::{Connection, ConnectionConfig};
//!
//! let mut conn = Connection::connect("example.com", "http", &ConnectionConfig::default()).await?;
//! conn.write(b"GET / HTTP/1.0\r\n\r\n").await?;
//! if let Some(data) = conn.read().await? {
//!     println!("{} bytes", data.len());
//! }
//! conn.close();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod reactor;

pub use client::{oneshot, Endpoint};
pub use connection::{
    AddressFamily, CandidateAddress, Connection, ConnectionConfig, Service, SocketKind, TlsConfig,
};
pub use error::{Error, Result};
pub use reactor::{Dispatch, EventLoop, Reactor};
