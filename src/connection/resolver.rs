//! Address resolution
//!
//! The resolver turns a hostname and port into an ordered list of candidate
//! addresses. Order is whatever the resolver reports and must be preserved by
//! callers. Service names are mapped to ports through `/etc/services`, falling
//! back to a small built-in table when the database is unavailable.

use super::address::CandidateAddress;
use crate::{Error, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::OnceLock;

/// Produces ordered candidate addresses for a host and port
pub trait Resolver: Send + Sync {
    /// Resolve `host` to candidates carrying `port`
    fn resolve(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Vec<CandidateAddress>>> + Send;
}

/// Resolver backed by the operating system (`getaddrinfo` via tokio)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<CandidateAddress>> {
        let addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| Error::Resolution(format!("{}: {}", host, e)))?;

        let candidates: Vec<CandidateAddress> = addrs.map(CandidateAddress::from).collect();
        tracing::debug!(host, port, count = candidates.len(), "resolved candidates");
        Ok(candidates)
    }
}

/// Resolver that always returns the same candidates, ignoring its inputs
///
/// Useful when addresses come from configuration or service discovery rather
/// than DNS.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    candidates: Vec<CandidateAddress>,
}

impl StaticResolver {
    /// Create a resolver returning `candidates` in order
    pub fn new(candidates: Vec<CandidateAddress>) -> Self {
        Self { candidates }
    }
}

impl Resolver for StaticResolver {
    async fn resolve(&self, _host: &str, _port: u16) -> Result<Vec<CandidateAddress>> {
        Ok(self.candidates.clone())
    }
}

const SERVICES_PATH: &str = "/etc/services";

// Used when /etc/services is missing (minimal containers)
const WELL_KNOWN_SERVICES: &[(&str, u16)] = &[
    ("ftp", 21),
    ("ssh", 22),
    ("telnet", 23),
    ("smtp", 25),
    ("domain", 53),
    ("http", 80),
    ("www", 80),
    ("pop3", 110),
    ("ntp", 123),
    ("imap", 143),
    ("ldap", 389),
    ("https", 443),
    ("submissions", 465),
    ("submission", 587),
    ("ldaps", 636),
    ("imaps", 993),
    ("pop3s", 995),
    ("mysql", 3306),
    ("postgresql", 5432),
    ("redis", 6379),
];

type ServiceTable = HashMap<(String, String), u16>;

fn services_table() -> &'static ServiceTable {
    static TABLE: OnceLock<ServiceTable> = OnceLock::new();
    TABLE.get_or_init(|| match std::fs::read_to_string(SERVICES_PATH) {
        Ok(contents) => parse_services(&contents),
        Err(e) => {
            tracing::debug!("{} unavailable ({}), using built-in services", SERVICES_PATH, e);
            HashMap::new()
        }
    })
}

/// Parse the `/etc/services` format: `name port/proto [aliases...] [# comment]`
pub(crate) fn parse_services(contents: &str) -> ServiceTable {
    let mut table = HashMap::new();

    for line in contents.lines() {
        let line = line.split('#').next().unwrap_or_default();
        let mut fields = line.split_whitespace();

        let (Some(name), Some(port_proto)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Some((port, proto)) = port_proto.split_once('/') else {
            continue;
        };
        let Ok(port) = port.parse::<u16>() else {
            continue;
        };

        for alias in std::iter::once(name).chain(fields) {
            table
                .entry((alias.to_string(), proto.to_string()))
                .or_insert(port);
        }
    }

    table
}

/// Look up the port for a service name and protocol (`"tcp"` / `"udp"`)
pub fn lookup_service(name: &str, protocol: &str) -> Option<u16> {
    if let Ok(port) = name.parse::<u16>() {
        return Some(port);
    }

    services_table()
        .get(&(name.to_string(), protocol.to_string()))
        .copied()
        .or_else(|| {
            WELL_KNOWN_SERVICES
                .iter()
                .find(|(service, _)| *service == name)
                .map(|(_, port)| *port)
        })
}
