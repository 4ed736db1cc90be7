//! Core connection type

use super::address::{AddressFamily, CandidateAddress, Service, SocketKind};
use super::establish;
use super::resolver::{Resolver, SystemResolver};
use super::state::ConnectionState;
use super::tls::parse_server_name;
use super::transport::Transport;
use super::TlsConfig;
use crate::metrics::{counters, labels};
use crate::reactor::{
    ConnectionId, DataHandler, Dispatch, ErrorHandler, Interest, Reactor, ReactorHandle,
};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

/// Default read size when the caller does not give one (5 MiB)
pub const DEFAULT_READ_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Connection configuration
///
/// All options are fixed once a connection is established. A connection is
/// encrypted exactly when `tls` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Transport kind (default: stream)
    pub kind: SocketKind,
    /// Protocol number passed to the socket (default: 0, the family default)
    pub protocol: i32,
    /// Read size used by `read()` and reactor dispatch (default: 5 MiB)
    pub read_chunk_size: usize,
    /// Per-candidate connect timeout (default: none)
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Option<Duration>,
    /// Disable Nagle's algorithm on stream sockets (default: false)
    pub nodelay: bool,
    /// TLS settings; `None` means plaintext
    #[serde(skip)]
    pub tls: Option<TlsConfig>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            kind: SocketKind::Stream,
            protocol: 0,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            connect_timeout: None,
            nodelay: false,
            tls: None,
        }
    }
}

impl ConnectionConfig {
    /// Create a builder
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ConnectionConfig::builder()
    ///     .connect_timeout(Duration::from_secs(5))
    ///     .tls(TlsConfig::builder().build()?)
    ///     .build();
    /// ```
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: ConnectionConfig::default(),
        }
    }

    /// Load the plaintext options from JSON.
    ///
    /// Missing fields take their defaults. TLS cannot be configured this way.
    ///
    /// ```ignore
    /// let config = ConnectionConfig::from_json(r#"{"kind": "datagram", "connect_timeout_ms": 500}"#)?;
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ConnectionConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid connection config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Whether connections built from this config are encrypted
    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    /// Check option combinations that can never produce a connection
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_size == 0 {
            return Err(Error::Config("read_chunk_size must be greater than 0".into()));
        }
        if self.tls.is_some() && self.kind == SocketKind::Datagram {
            return Err(Error::Config("TLS requires a stream socket".into()));
        }
        Ok(())
    }
}

/// Builder for creating `ConnectionConfig`
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Set the transport kind
    pub fn kind(mut self, kind: SocketKind) -> Self {
        self.config.kind = kind;
        self
    }

    /// Set the protocol number
    pub fn protocol(mut self, protocol: i32) -> Self {
        self.config.protocol = protocol;
        self
    }

    /// Set the default read size
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Bound each connect attempt
    ///
    /// A timed-out candidate counts as failed and the next one is tried.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.config.connect_timeout = Some(duration);
        self
    }

    /// Set TCP_NODELAY on stream sockets
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Encrypt the connection with TLS
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// An established client connection
///
/// Owns its socket exclusively and, when encrypted, the TLS session layered on
/// it. Plaintext and encrypted I/O differ only inside [`read_bytes`](Self::read_bytes)
/// and [`write`](Self::write).
pub struct Connection {
    id: ConnectionId,
    transport: Option<Transport>,
    state: ConnectionState,
    family: AddressFamily,
    kind: SocketKind,
    protocol: i32,
    port: u16,
    remote_addr: SocketAddr,
    peer_address: Option<SocketAddr>,
    read_chunk_size: usize,
    on_data: Option<Box<dyn DataHandler>>,
    on_error: Option<Box<dyn ErrorHandler>>,
    reactor: Option<ReactorHandle>,
}

impl Connection {
    /// Connect to `host` by DNS, trying every resolved address in order
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> connsock::Result<()> {
    /// use connsock::{Connection, ConnectionConfig};
    ///
    /// let conn = Connection::connect("localhost", 8080u16, &ConnectionConfig::default()).await?;
    /// let conn = Connection::connect("example.com", "https", &ConnectionConfig::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(
        host: &str,
        service: impl Into<Service>,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        Self::connect_with(&SystemResolver, host, service, config).await
    }

    /// Connect using a custom resolver
    pub async fn connect_with<R: Resolver>(
        resolver: &R,
        host: &str,
        service: impl Into<Service>,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let port = service.into().port(config.kind)?;
        let candidates = resolver.resolve(host, port).await?;
        establish::establish(&candidates, host, config).await
    }

    /// Connect to a literal IPv4 address, bypassing resolution
    pub async fn connect_ipv4(
        literal: &str,
        service: impl Into<Service>,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        let port = service.into().port(config.kind)?;
        let candidate = CandidateAddress::parse_literal(literal, AddressFamily::Inet, port)?;
        establish::establish_literal(&candidate, config).await
    }

    /// Connect to a literal IPv6 address, bypassing resolution
    pub async fn connect_ipv6(
        literal: &str,
        service: impl Into<Service>,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        let port = service.into().port(config.kind)?;
        let candidate = CandidateAddress::parse_literal(literal, AddressFamily::Inet6, port)?;
        establish::establish_literal(&candidate, config).await
    }

    /// Connect to a parsed IP address, bypassing resolution
    pub async fn connect_literal(
        ip: IpAddr,
        service: impl Into<Service>,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        let port = service.into().port(config.kind)?;
        let candidate = CandidateAddress::from(SocketAddr::new(ip, port));
        establish::establish_literal(&candidate, config).await
    }

    /// Wrap a freshly connected transport
    pub(crate) fn from_transport(
        transport: Transport,
        candidate: &CandidateAddress,
        remote_addr: SocketAddr,
        literal: bool,
        config: &ConnectionConfig,
    ) -> Self {
        Self {
            id: ConnectionId::next(),
            transport: Some(transport),
            state: ConnectionState::Connected,
            family: candidate.family(),
            kind: config.kind,
            protocol: config.protocol,
            port: candidate.port(),
            remote_addr,
            peer_address: literal.then_some(remote_addr),
            read_chunk_size: config.read_chunk_size,
            on_data: None,
            on_error: None,
            reactor: None,
        }
    }

    /// Layer a TLS session over the connected socket.
    ///
    /// On failure the socket has already been released.
    pub(crate) async fn secure(&mut self, tls_config: &TlsConfig, hostname: &str) -> Result<()> {
        let server_name = parse_server_name(hostname)?;
        self.state.transition(ConnectionState::Handshaking)?;

        let transport = self.transport.take().ok_or(Error::ConnectionClosed)?;
        tracing::debug!(%hostname, port = self.port, "starting TLS handshake");

        match transport.upgrade_to_tls(tls_config, server_name).await {
            Ok(upgraded) => {
                self.transport = Some(upgraded);
                self.state.transition(ConnectionState::Secured)?;
                tracing::info!(%hostname, "TLS session established");
                Ok(())
            }
            Err(e) => {
                counters::handshake_failed();
                self.state.transition(ConnectionState::Closed)?;
                Err(e)
            }
        }
    }

    /// Read up to `read_chunk_size` bytes
    pub async fn read(&mut self) -> Result<Option<Bytes>> {
        self.read_bytes(self.read_chunk_size).await
    }

    /// Read up to `byte_count` bytes with a single receive.
    ///
    /// Returns `Ok(None)` when the peer has closed the connection. A
    /// `byte_count` of zero reads `read_chunk_size` bytes instead, and larger
    /// requests are capped at `read_chunk_size`, which bounds the buffer
    /// allocated per call.
    ///
    /// On an encrypted connection every session error is also reported as
    /// `Ok(None)`, while plaintext receive failures surface as
    /// [`Error::Read`]. This asymmetry is kept for compatibility; it can hide
    /// real I/O faults behind an apparent end-of-stream, so each downgraded
    /// error is logged at `warn`.
    pub async fn read_bytes(&mut self, byte_count: usize) -> Result<Option<Bytes>> {
        self.ensure_open()?;
        let size = match byte_count {
            0 => self.read_chunk_size,
            n => n.min(self.read_chunk_size),
        };
        let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;

        let mut buf = BytesMut::zeroed(size);
        let received = transport.recv(&mut buf).await;

        let n = match received {
            Ok(n) => n,
            Err(e) if transport.is_tls() => {
                tracing::warn!(id = %self.id, error = %e, "encrypted read failed, reporting end-of-stream");
                return Ok(None);
            }
            Err(e) => return Err(Error::Read(e)),
        };

        if n == 0 {
            tracing::debug!(id = %self.id, "peer closed the connection");
            return Ok(None);
        }

        counters::bytes_read(n);
        buf.truncate(n);
        Ok(Some(buf.freeze()))
    }

    /// Send `data` with a single send, returning the number of bytes accepted.
    ///
    /// Plaintext sends are not retried: a short count is returned as-is and
    /// resending the remainder is up to the caller. Encrypted writes always
    /// consume the whole buffer.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;

        let n = transport.send(data).await.map_err(Error::Write)?;
        if n < data.len() {
            tracing::debug!(id = %self.id, sent = n, len = data.len(), "partial send");
        }
        counters::bytes_written(n);
        Ok(n)
    }

    /// Wait until the socket has data pending.
    ///
    /// For TLS connections this reflects the raw socket only; plaintext the
    /// session has already decrypted is not signalled here.
    pub async fn readable(&mut self) -> Result<()> {
        self.ensure_open()?;
        let transport = self.transport.as_ref().ok_or(Error::ConnectionClosed)?;
        transport.readable().await.map_err(Error::Read)
    }

    /// Set the handler invoked with each chunk received during reactor dispatch.
    ///
    /// Returning `false` tears the connection down. Without a handler, the
    /// connection is torn down after the first dispatch.
    pub fn on_data(&mut self, handler: impl DataHandler + 'static) {
        self.on_data = Some(Box::new(handler));
    }

    /// Set the handler invoked when a dispatched read fails.
    ///
    /// Returning `true` keeps the connection registered. Without a handler,
    /// any read error tears the connection down.
    pub fn on_error(&mut self, handler: impl ErrorHandler + 'static) {
        self.on_error = Some(Box::new(handler));
    }

    /// Register with a reactor for readiness notifications.
    ///
    /// The connection keeps only a weak reference, used to unregister on close.
    pub fn attach<R: Reactor + 'static>(&mut self, reactor: &Arc<R>, interest: Interest) -> Result<()> {
        self.ensure_open()?;
        if self.reactor.is_some() {
            return Err(Error::Config(format!(
                "connection {} is already registered with a reactor",
                self.id
            )));
        }

        let reactor: Arc<dyn Reactor> = reactor.clone();
        let fd = self
            .transport
            .as_ref()
            .ok_or(Error::ConnectionClosed)?
            .as_raw_fd();
        reactor.register(self.id, fd, interest)?;
        self.reactor = Some(ReactorHandle::new(self.id, &reactor));
        tracing::debug!(id = %self.id, fd, ?interest, "registered with reactor");
        Ok(())
    }

    /// Readiness callback: read up to `size_hint` bytes and hand them to the data handler.
    ///
    /// Errors never propagate from here; they go to the error handler, and the
    /// returned [`Dispatch`] says whether the connection is still open.
    pub async fn on_readiness(&mut self, size_hint: usize) -> Dispatch {
        if !self.state.is_open() {
            return Dispatch::Closed;
        }

        match self.read_bytes(size_hint).await {
            Ok(payload) => {
                let keep = match self.on_data.as_mut() {
                    Some(handler) => handler.on_data(payload),
                    None => false,
                };
                if keep {
                    Dispatch::Continue
                } else {
                    self.close_with(labels::CLOSE_HANDLER);
                    Dispatch::Closed
                }
            }
            Err(err) => self.dispatch_error(err),
        }
    }

    /// Route a dispatch-time error to the error handler
    pub(crate) fn dispatch_error(&mut self, err: Error) -> Dispatch {
        tracing::debug!(id = %self.id, error = %err, "dispatch read failed");
        let keep = match self.on_error.as_mut() {
            Some(handler) => handler.on_error(&err),
            None => false,
        };
        if keep {
            Dispatch::Continue
        } else {
            self.close_with(labels::CLOSE_ERROR);
            Dispatch::Closed
        }
    }

    /// Gracefully shut down (TLS close_notify, TCP FIN), then close
    pub async fn shutdown(&mut self) -> Result<()> {
        let result = match self.transport.as_mut() {
            Some(transport) if self.state.is_open() => transport.shutdown().await.map_err(Error::Write),
            _ => Ok(()),
        };
        self.close();
        result
    }

    /// Unregister from the reactor (if any), then release the socket.
    ///
    /// Calling this on an already closed connection does nothing.
    pub fn close(&mut self) {
        self.close_with(labels::CLOSE_EXPLICIT);
    }

    fn close_with(&mut self, reason: &'static str) {
        if self.state == ConnectionState::Closed && self.transport.is_none() {
            tracing::debug!(id = %self.id, "close on closed connection ignored");
            return;
        }

        if let Some(handle) = self.reactor.take() {
            handle.unregister();
        }
        drop(self.transport.take());

        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closed;
        }
        counters::connection_closed(reason);
        tracing::debug!(id = %self.id, reason, "connection closed");
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ConnectionState::Connected | ConnectionState::Secured => Ok(()),
            ConnectionState::Closed => Err(Error::ConnectionClosed),
            ConnectionState::Handshaking => Err(Error::InvalidState {
                expected: "connected or secured".into(),
                actual: self.state.to_string(),
            }),
        }
    }

    /// Identity used for reactor registration
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Raw descriptor, `None` once closed
    pub fn descriptor(&self) -> Option<RawFd> {
        self.transport.as_ref().map(|t| t.as_raw_fd())
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the connection has been closed
    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Whether I/O goes through a TLS session
    pub fn is_secure(&self) -> bool {
        self.transport.as_ref().is_some_and(Transport::is_tls)
    }

    /// Address family of the connected socket
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Transport kind
    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    /// Protocol number
    pub fn protocol(&self) -> i32 {
        self.protocol
    }

    /// Port of the connected peer
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The literal address used, for connections built without resolution
    pub fn peer_address(&self) -> Option<SocketAddr> {
        self.peer_address
    }

    /// Address of the candidate that accepted the connection
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Default read size
    pub fn read_chunk_size(&self) -> usize {
        self.read_chunk_size
    }

    /// Whether a reactor registration is held
    pub fn is_registered(&self) -> bool {
        self.reactor.is_some()
    }

    /// SHA-256 fingerprint of the server certificate (TLS only)
    pub fn peer_certificate_fingerprint(&self) -> Option<Vec<u8>> {
        self.transport
            .as_ref()
            .and_then(Transport::peer_certificate_fingerprint)
    }

    pub(crate) fn transport_label(&self) -> &'static str {
        self.transport.as_ref().map_or(labels::TRANSPORT_PLAIN, Transport::label)
    }

    /// Apply socket options that do not change the transport
    pub(crate) fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        if let Some(transport) = self.transport.as_ref() {
            transport.set_nodelay(nodelay)?;
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if !self.is_closed() || self.transport.is_some() {
            self.close_with(labels::CLOSE_DROP);
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("family", &self.family)
            .field("kind", &self.kind)
            .field("protocol", &self.protocol)
            .field("remote_addr", &self.remote_addr)
            .field("secure", &self.is_secure())
            .field("registered", &self.reactor.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (Connection, tokio::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let conn = Connection::connect_ipv4("127.0.0.1", port, &ConnectionConfig::default())
            .await
            .unwrap();
        (conn, accept.await.unwrap())
    }

    #[test]
    fn test_config_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.kind, SocketKind::Stream);
        assert_eq!(config.protocol, 0);
        assert_eq!(config.read_chunk_size, 5_242_880);
        assert!(config.connect_timeout.is_none());
        assert!(!config.is_secure());
    }

    #[test]
    fn test_config_builder() {
        let config = ConnectionConfig::builder()
            .kind(SocketKind::Datagram)
            .read_chunk_size(1024)
            .connect_timeout(Duration::from_millis(250))
            .build();
        assert_eq!(config.kind, SocketKind::Datagram);
        assert_eq!(config.read_chunk_size, 1024);
        assert_eq!(config.connect_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_config_from_json() {
        let config =
            ConnectionConfig::from_json(r#"{"kind": "datagram", "connect_timeout_ms": 500}"#).unwrap();
        assert_eq!(config.kind, SocketKind::Datagram);
        assert_eq!(config.connect_timeout, Some(Duration::from_millis(500)));
        assert_eq!(config.read_chunk_size, DEFAULT_READ_CHUNK_SIZE);
    }

    #[test]
    fn test_config_from_json_rejects_zero_chunk() {
        let result = ConnectionConfig::from_json(r#"{"read_chunk_size": 0}"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_tls_over_datagram_is_invalid() {
        let config = ConnectionConfig::builder()
            .kind(SocketKind::Datagram)
            .tls(TlsConfig::insecure())
            .build();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_read_returns_exact_bytes() {
        let (mut conn, mut peer) = loopback_pair().await;
        peer.write_all(b"hello").await.unwrap();

        let data = conn.read_bytes(64).await.unwrap().unwrap();
        assert_eq!(&data[..], b"hello");
    }

    #[tokio::test]
    async fn test_read_request_capped_at_chunk_size() {
        let config = ConnectionConfig::builder().read_chunk_size(4).build();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let mut conn = Connection::connect_ipv4("127.0.0.1", port, &config).await.unwrap();
        let mut peer = accept.await.unwrap();

        peer.write_all(b"0123456789").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let data = conn.read_bytes(usize::MAX).await.unwrap().unwrap();
        assert_eq!(&data[..], b"0123");
    }

    #[tokio::test]
    async fn test_readiness_futures_are_send() {
        fn assert_send<T: Send>(_: T) {}

        let (mut conn, _peer) = loopback_pair().await;
        assert_send(conn.readable());
        assert_send(conn.on_readiness(16));
        assert_send(conn.read());
    }

    #[tokio::test]
    async fn test_read_eof_is_none() {
        let (mut conn, peer) = loopback_pair().await;
        drop(peer);

        assert!(conn.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_io_after_close_fails() {
        let (mut conn, _peer) = loopback_pair().await;
        assert!(conn.descriptor().is_some());

        conn.close();
        assert!(conn.is_closed());
        assert!(conn.descriptor().is_none());
        assert!(matches!(conn.read().await, Err(Error::ConnectionClosed)));
        assert!(matches!(conn.write(b"x").await, Err(Error::ConnectionClosed)));

        // second close is a no-op
        conn.close();
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_literal_connection_metadata() {
        let (conn, peer) = loopback_pair().await;
        let local = peer.local_addr().unwrap();

        assert_eq!(conn.family(), AddressFamily::Inet);
        assert_eq!(conn.port(), local.port());
        assert_eq!(conn.peer_address(), Some(local));
        assert_eq!(conn.remote_addr(), local);
        assert!(!conn.is_secure());
        assert!(conn.peer_certificate_fingerprint().is_none());
    }

    #[tokio::test]
    async fn test_dispatch_without_handler_tears_down() {
        let (mut conn, mut peer) = loopback_pair().await;
        peer.write_all(b"data").await.unwrap();

        assert_eq!(conn.on_readiness(4).await, Dispatch::Closed);
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_dispatch_keeps_connection_when_handler_returns_true() {
        let (mut conn, mut peer) = loopback_pair().await;
        let mut seen = Vec::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        conn.on_data(move |data: Option<Bytes>| {
            tx.send(data).unwrap();
            true
        });

        peer.write_all(b"one").await.unwrap();
        assert_eq!(conn.on_readiness(3).await, Dispatch::Continue);
        seen.push(rx.recv().await.unwrap());

        assert!(!conn.is_closed());
        assert_eq!(seen, vec![Some(Bytes::from_static(b"one"))]);
    }

    #[tokio::test]
    async fn test_shutdown_sends_fin() {
        let (mut conn, mut peer) = loopback_pair().await;
        conn.shutdown().await.unwrap();
        assert!(conn.is_closed());

        let mut buf = [0u8; 8];
        let n = tokio::io::AsyncReadExt::read(&mut peer, &mut buf).await.unwrap();
        assert_eq!(n, 0);
    }
}
