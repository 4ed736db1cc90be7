//! Transport abstraction (stream with optional TLS vs connected datagram socket)

use super::address::{CandidateAddress, SocketKind};
use crate::metrics::labels;
use crate::{Error, Result};
use rustls_pki_types::ServerName;
use sha2::Digest;
use socket2::{Protocol, SockAddr, Socket};
use std::io;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream, UdpSocket};

/// Stream variant: plain or TLS-encrypted
#[allow(clippy::large_enum_variant)]
pub enum StreamVariant {
    /// Plain stream connection
    Plain(TcpStream),
    /// TLS-encrypted stream connection
    Tls(tokio_rustls::client::TlsStream<TcpStream>),
}

impl std::fmt::Debug for StreamVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamVariant::Plain(_) => f.write_str("StreamVariant::Plain(TcpStream)"),
            StreamVariant::Tls(_) => f.write_str("StreamVariant::Tls(TlsStream)"),
        }
    }
}

impl StreamVariant {
    fn tcp(&self) -> &TcpStream {
        match self {
            StreamVariant::Plain(stream) => stream,
            StreamVariant::Tls(stream) => stream.get_ref().0,
        }
    }

    /// Extract the SHA-256 fingerprint of the server's leaf certificate.
    ///
    /// Returns `None` for plain connections.
    pub fn peer_certificate_fingerprint(&self) -> Option<Vec<u8>> {
        match self {
            StreamVariant::Plain(_) => None,
            StreamVariant::Tls(stream) => {
                let (_tcp, conn) = stream.get_ref();
                let certs = conn.peer_certificates()?;
                let server_cert = certs.first()?;
                let hash = sha2::Sha256::digest(server_cert.as_ref());
                Some(hash.to_vec())
            }
        }
    }
}

/// Transport layer abstraction
#[derive(Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    /// Connection-oriented stream (plain or TLS)
    Stream(StreamVariant),
    /// Connected datagram socket
    Datagram(UdpSocket),
}

#[cfg(test)]
thread_local! {
    /// Sockets opened on this thread
    pub(crate) static SOCKETS_OPENED: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Open a non-blocking socket for the candidate's family and the requested kind/protocol
pub(crate) fn open_socket(
    candidate: &CandidateAddress,
    kind: SocketKind,
    protocol: i32,
) -> io::Result<Socket> {
    let domain = candidate.family().domain().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unsupported address family for {}", candidate),
        )
    })?;
    let protocol = (protocol != 0).then(|| Protocol::from(protocol));

    let socket = Socket::new(domain, kind.socket_type(), protocol)?;
    #[cfg(test)]
    SOCKETS_OPENED.with(|opened| opened.set(opened.get() + 1));
    socket.set_nonblocking(true)?;
    Ok(socket)
}

impl Transport {
    /// Open a socket and connect it to one candidate.
    ///
    /// The socket is released if the attempt fails or times out.
    pub async fn connect(
        candidate: &CandidateAddress,
        kind: SocketKind,
        protocol: i32,
        timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let addr = candidate.socket_addr().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported address family for {}", candidate),
            )
        })?;
        let socket = open_socket(candidate, kind, protocol)?;

        match kind {
            SocketKind::Stream => {
                let tcp = TcpSocket::from_std_stream(socket.into());
                let attempt = tcp.connect(addr);
                let stream = match timeout {
                    Some(limit) => tokio::time::timeout(limit, attempt).await.map_err(|_| {
                        io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("connect to {} timed out after {:?}", addr, limit),
                        )
                    })??,
                    None => attempt.await?,
                };
                Ok(Transport::Stream(StreamVariant::Plain(stream)))
            }
            SocketKind::Datagram => {
                socket.connect(&SockAddr::from(addr))?;
                let udp = UdpSocket::from_std(socket.into())?;
                Ok(Transport::Datagram(udp))
            }
        }
    }

    /// Upgrade a plain stream transport to TLS.
    ///
    /// Consumes `self`; on failure the underlying socket is dropped.
    pub async fn upgrade_to_tls(
        self,
        tls_config: &super::TlsConfig,
        server_name: ServerName<'static>,
    ) -> Result<Self> {
        match self {
            Transport::Stream(StreamVariant::Plain(tcp_stream)) => {
                let tls_connector = tokio_rustls::TlsConnector::from(tls_config.client_config());
                let tls_stream = tls_connector
                    .connect(server_name, tcp_stream)
                    .await
                    .map_err(|e| Error::Handshake(e.to_string()))?;

                Ok(Transport::Stream(StreamVariant::Tls(tls_stream)))
            }
            Transport::Stream(StreamVariant::Tls(_)) => Err(Error::Config(
                "transport is already TLS-encrypted".into(),
            )),
            Transport::Datagram(_) => Err(Error::Config(
                "cannot upgrade a datagram socket to TLS".into(),
            )),
        }
    }

    /// Single receive of up to `buf.len()` bytes
    pub async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Stream(StreamVariant::Plain(stream)) => stream.read(buf).await,
            Transport::Stream(StreamVariant::Tls(stream)) => stream.read(buf).await,
            Transport::Datagram(socket) => socket.recv(buf).await,
        }
    }

    /// Single send of `buf`, returning the number of bytes accepted.
    ///
    /// TLS writes always consume the whole buffer and flush the record.
    pub async fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Stream(StreamVariant::Plain(stream)) => stream.write(buf).await,
            Transport::Stream(StreamVariant::Tls(stream)) => {
                stream.write_all(buf).await?;
                stream.flush().await?;
                Ok(buf.len())
            }
            Transport::Datagram(socket) => socket.send(buf).await,
        }
    }

    /// Wait until the underlying socket is readable
    pub async fn readable(&self) -> io::Result<()> {
        match self {
            Transport::Stream(variant) => variant.tcp().readable().await,
            Transport::Datagram(socket) => socket.readable().await,
        }
    }

    /// Shutdown the transport (TLS close_notify and FIN for streams)
    pub async fn shutdown(&mut self) -> io::Result<()> {
        match self {
            Transport::Stream(StreamVariant::Plain(stream)) => stream.shutdown().await,
            Transport::Stream(StreamVariant::Tls(stream)) => stream.shutdown().await,
            Transport::Datagram(_) => Ok(()),
        }
    }

    /// Disable Nagle's algorithm on stream sockets
    pub fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        match self {
            Transport::Stream(variant) => variant.tcp().set_nodelay(nodelay),
            Transport::Datagram(_) => Ok(()),
        }
    }

    /// Address of the connected peer
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Transport::Stream(variant) => variant.tcp().peer_addr(),
            Transport::Datagram(socket) => socket.peer_addr(),
        }
    }

    /// Whether I/O goes through a TLS session
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Stream(StreamVariant::Tls(_)))
    }

    /// Metrics label for this transport
    pub fn label(&self) -> &'static str {
        match self {
            Transport::Stream(StreamVariant::Plain(_)) => labels::TRANSPORT_PLAIN,
            Transport::Stream(StreamVariant::Tls(_)) => labels::TRANSPORT_TLS,
            Transport::Datagram(_) => labels::TRANSPORT_DATAGRAM,
        }
    }

    /// SHA-256 fingerprint of the peer certificate (TLS only)
    pub fn peer_certificate_fingerprint(&self) -> Option<Vec<u8>> {
        match self {
            Transport::Stream(variant) => variant.peer_certificate_fingerprint(),
            Transport::Datagram(_) => None,
        }
    }
}

impl AsRawFd for Transport {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Transport::Stream(variant) => variant.tcp().as_raw_fd(),
            Transport::Datagram(socket) => socket.as_raw_fd(),
        }
    }
}
