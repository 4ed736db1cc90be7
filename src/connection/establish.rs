//! Connection establishment
//!
//! Candidates are tried strictly in the order given. The first one that
//! accepts wins and later candidates are never attempted; every socket opened
//! for a failed candidate is released before moving on.

use super::address::CandidateAddress;
use super::conn::{Connection, ConnectionConfig};
use super::transport::Transport;
use crate::metrics::{counters, histograms};
use crate::{Error, Result};
use std::io;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::Instrument;

/// Connect to the first candidate that accepts, then apply TLS if configured.
///
/// # Errors
///
/// - [`Error::Resolution`] if `candidates` is empty
/// - [`Error::UnsupportedAddressFamily`] if no candidate has a supported family
/// - [`Error::Connect`] with the last OS error when every candidate fails
/// - [`Error::Handshake`] if TLS negotiation fails after connecting
///
/// The first two are reported before any socket is opened.
pub async fn establish(
    candidates: &[CandidateAddress],
    host: &str,
    config: &ConnectionConfig,
) -> Result<Connection> {
    let port = candidates.first().map(CandidateAddress::port).unwrap_or(0);
    establish_in_order(candidates, host, config)
        .instrument(tracing::info_span!("establish", %host, port))
        .await
}

async fn establish_in_order(
    candidates: &[CandidateAddress],
    host: &str,
    config: &ConnectionConfig,
) -> Result<Connection> {
    config.validate()?;

    if candidates.is_empty() {
        counters::connect_failed("no_candidates");
        return Err(Error::Resolution(format!("no candidate addresses for '{}'", host)));
    }
    if !candidates.iter().any(CandidateAddress::is_supported) {
        counters::connect_failed("unsupported_family");
        return Err(Error::UnsupportedAddressFamily(format!(
            "none of the {} candidate(s) for '{}' is IPv4 or IPv6",
            candidates.len(),
            host
        )));
    }

    let started = Instant::now();
    let mut attempts = 0;
    let mut last_error: Option<io::Error> = None;

    for candidate in candidates {
        if !candidate.is_supported() {
            tracing::debug!(%candidate, "skipping unsupported candidate");
            continue;
        }

        attempts += 1;
        counters::connect_attempted(candidate.family().label());

        match try_candidate(candidate, config).await {
            Ok((transport, remote_addr)) => {
                tracing::debug!(%candidate, attempts, "candidate accepted");
                let conn =
                    Connection::from_transport(transport, candidate, remote_addr, false, config);
                return finish(conn, host, config, started).await;
            }
            Err(e) => {
                tracing::debug!(%candidate, error = %e, "candidate failed");
                last_error = Some(e);
            }
        }
    }

    counters::connect_failed("exhausted");
    Err(Error::Connect {
        attempts,
        source: last_error.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotConnected)),
    })
}

/// Connect to a single literal address, then apply TLS if configured.
///
/// There is no fallback: a failed connect is returned immediately.
pub async fn establish_literal(
    candidate: &CandidateAddress,
    config: &ConnectionConfig,
) -> Result<Connection> {
    establish_one(candidate, config)
        .instrument(tracing::info_span!("establish_literal", %candidate))
        .await
}

async fn establish_one(
    candidate: &CandidateAddress,
    config: &ConnectionConfig,
) -> Result<Connection> {
    config.validate()?;

    if !candidate.is_supported() {
        counters::connect_failed("unsupported_family");
        return Err(Error::UnsupportedAddressFamily(candidate.to_string()));
    }

    let started = Instant::now();
    counters::connect_attempted(candidate.family().label());

    let (transport, remote_addr) = try_candidate(candidate, config).await.map_err(|source| {
        counters::connect_failed("literal");
        Error::Connect {
            attempts: 1,
            source,
        }
    })?;

    let host = remote_addr.ip().to_string();
    let conn = Connection::from_transport(transport, candidate, remote_addr, true, config);
    finish(conn, &host, config, started).await
}

/// One connect attempt; the socket is released when the attempt fails
async fn try_candidate(
    candidate: &CandidateAddress,
    config: &ConnectionConfig,
) -> io::Result<(Transport, SocketAddr)> {
    let transport =
        Transport::connect(candidate, config.kind, config.protocol, config.connect_timeout).await?;
    let remote_addr = match candidate.socket_addr() {
        Some(addr) => addr,
        None => transport.peer_addr()?,
    };
    Ok((transport, remote_addr))
}

/// Apply socket options and the optional TLS step to a connected socket
async fn finish(
    mut conn: Connection,
    host: &str,
    config: &ConnectionConfig,
    started: Instant,
) -> Result<Connection> {
    if config.nodelay {
        conn.set_nodelay(true)?;
    }

    if let Some(tls) = &config.tls {
        conn.secure(tls, host).await?;
    }

    histograms::connect_duration(started.elapsed().as_millis() as u64);
    counters::connection_established(conn.family().label(), conn.transport_label());
    tracing::info!(
        id = %conn.id(),
        remote = %conn.remote_addr(),
        family = %conn.family(),
        secure = conn.is_secure(),
        "connection established"
    );
    Ok(conn)
}
