//! Integration tests for plaintext read/write semantics
//!
//! Covers stream round trips, end-of-stream, receive failures and datagram
//! sockets over loopback.

use bytes::Bytes;
use connsock::{Connection, ConnectionConfig, Error, SocketKind};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_test::{assert_err, assert_ok};

async fn loopback_pair(config: &ConnectionConfig) -> (Connection, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
    let conn = Connection::connect_ipv4("127.0.0.1", port, config).await.unwrap();
    (conn, accept.await.unwrap())
}

#[tokio::test]
async fn test_round_trip_is_byte_exact() {
    let (mut conn, mut peer) = loopback_pair(&ConnectionConfig::default()).await;
    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

    let n = assert_ok!(conn.write(&payload).await);
    assert_eq!(n, payload.len());

    let mut received = vec![0u8; payload.len()];
    peer.read_exact(&mut received).await.unwrap();
    assert_eq!(received, payload);

    peer.write_all(b"reply bytes").await.unwrap();
    let data = conn.read_bytes(b"reply bytes".len()).await.unwrap();
    assert_eq!(data, Some(Bytes::from_static(b"reply bytes")));
}

#[tokio::test]
async fn test_read_never_returns_more_than_requested() {
    let (mut conn, mut peer) = loopback_pair(&ConnectionConfig::default()).await;
    peer.write_all(b"abcdefgh").await.unwrap();
    peer.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let first = conn.read_bytes(3).await.unwrap().unwrap();
    assert_eq!(&first[..], b"abc");
    let rest = conn.read_bytes(64).await.unwrap().unwrap();
    assert_eq!(&rest[..], b"defgh");
}

#[tokio::test]
async fn test_configured_chunk_size_bounds_read() {
    let config = ConnectionConfig::builder().read_chunk_size(4).build();
    let (mut conn, mut peer) = loopback_pair(&config).await;
    peer.write_all(b"0123456789").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(conn.read_chunk_size(), 4);
    let chunk = conn.read().await.unwrap().unwrap();
    assert_eq!(&chunk[..], b"0123");
    let chunk = conn.read_bytes(0).await.unwrap().unwrap();
    assert_eq!(&chunk[..], b"4567");
}

#[tokio::test]
async fn test_peer_close_is_end_of_stream() {
    let (mut conn, peer) = loopback_pair(&ConnectionConfig::default()).await;
    drop(peer);

    assert_eq!(conn.read().await.unwrap(), None);
    assert!(!conn.is_closed());
}

#[tokio::test]
async fn test_reset_is_read_error() {
    let (mut conn, peer) = loopback_pair(&ConnectionConfig::default()).await;

    // Zero linger turns close into an RST
    let std_stream = peer.into_std().unwrap();
    socket2::SockRef::from(&std_stream)
        .set_linger(Some(Duration::ZERO))
        .unwrap();
    drop(std_stream);

    let err = assert_err!(conn.read().await);
    match err {
        Error::Read(io) => {
            assert_eq!(io.kind(), std::io::ErrorKind::ConnectionReset);
            assert!(Error::Read(io).to_string().starts_with("recv: "));
        }
        other => panic!("expected read error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_nodelay_option() {
    let config = ConnectionConfig::builder().nodelay(true).build();
    let (mut conn, mut peer) = loopback_pair(&config).await;

    conn.write(b"x").await.unwrap();
    let mut buf = [0u8; 1];
    peer.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"x");
}

#[tokio::test]
async fn test_drop_closes_socket() {
    let (conn, mut peer) = loopback_pair(&ConnectionConfig::default()).await;
    drop(conn);

    let mut buf = [0u8; 1];
    let n = peer.read(&mut buf).await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_datagram_exchange() {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server_addr = server.local_addr().unwrap();

    let config = ConnectionConfig::builder().kind(SocketKind::Datagram).build();
    let mut conn = Connection::connect_ipv4("127.0.0.1", server_addr.port(), &config)
        .await
        .unwrap();
    assert_eq!(conn.kind(), SocketKind::Datagram);
    assert!(!conn.is_secure());

    assert_eq!(conn.write(b"datagram").await.unwrap(), 8);

    let mut buf = [0u8; 64];
    let (n, from) = server.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"datagram");

    server.send_to(b"ack", from).await.unwrap();
    let reply = conn.read_bytes(64).await.unwrap();
    assert_eq!(reply, Some(Bytes::from_static(b"ack")));

    conn.close();
    assert!(conn.descriptor().is_none());
}
