//! Candidate addresses, address families, socket kinds and services

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use socket2::{Domain, SockAddr, Type};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Address family actually used by a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressFamily {
    /// Not yet known (before a successful connect)
    #[default]
    Unspecified,
    /// IPv4
    Inet,
    /// IPv6
    Inet6,
}

impl AddressFamily {
    /// Socket domain for this family, `None` for `Unspecified`
    pub fn domain(&self) -> Option<Domain> {
        match self {
            AddressFamily::Inet => Some(Domain::IPV4),
            AddressFamily::Inet6 => Some(Domain::IPV6),
            AddressFamily::Unspecified => None,
        }
    }

    /// Metrics label for this family
    pub fn label(&self) -> &'static str {
        match self {
            AddressFamily::Inet => crate::metrics::labels::FAMILY_INET,
            AddressFamily::Inet6 => crate::metrics::labels::FAMILY_INET6,
            AddressFamily::Unspecified => crate::metrics::labels::FAMILY_UNSPEC,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Unspecified => write!(f, "unspec"),
            AddressFamily::Inet => write!(f, "inet"),
            AddressFamily::Inet6 => write!(f, "inet6"),
        }
    }
}

/// Transport kind, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketKind {
    /// Connection-oriented byte stream
    #[default]
    Stream,
    /// Connected datagram socket
    Datagram,
}

impl SocketKind {
    /// Socket type for this kind
    pub fn socket_type(&self) -> Type {
        match self {
            SocketKind::Stream => Type::STREAM,
            SocketKind::Datagram => Type::DGRAM,
        }
    }

    /// Protocol name used for service lookups
    pub fn service_protocol(&self) -> &'static str {
        match self {
            SocketKind::Stream => "tcp",
            SocketKind::Datagram => "udp",
        }
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketKind::Stream => write!(f, "stream"),
            SocketKind::Datagram => write!(f, "datagram"),
        }
    }
}

impl std::str::FromStr for SocketKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "stream" | "tcp" => Ok(SocketKind::Stream),
            "datagram" | "dgram" | "udp" => Ok(SocketKind::Datagram),
            _ => Err(Error::Config(format!(
                "invalid socket kind '{}': expected stream or datagram",
                s
            ))),
        }
    }
}

/// Target service: a numeric port or a service name such as `"https"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Service {
    /// Numeric port
    Port(u16),
    /// Service name, resolved to a port through the services database
    Name(String),
}

impl Service {
    /// Resolve to a numeric port for the given socket kind
    pub fn port(&self, kind: SocketKind) -> Result<u16> {
        match self {
            Service::Port(port) => Ok(*port),
            Service::Name(name) => super::resolver::lookup_service(name, kind.service_protocol())
                .ok_or_else(|| {
                    Error::Resolution(format!(
                        "unknown service '{}/{}'",
                        name,
                        kind.service_protocol()
                    ))
                }),
        }
    }
}

impl From<u16> for Service {
    fn from(port: u16) -> Self {
        Service::Port(port)
    }
}

impl From<&str> for Service {
    fn from(s: &str) -> Self {
        match s.parse::<u16>() {
            Ok(port) => Service::Port(port),
            Err(_) => Service::Name(s.to_string()),
        }
    }
}

impl From<String> for Service {
    fn from(s: String) -> Self {
        Service::from(s.as_str())
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Port(port) => write!(f, "{}", port),
            Service::Name(name) => write!(f, "{}", name),
        }
    }
}

/// One resolver-produced address eligible for a connection attempt
///
/// Establishment matches only on the variant tag; the family-specific binary
/// form is available through [`CandidateAddress::sock_addr`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateAddress {
    /// IPv4 address and port
    V4(SocketAddrV4),
    /// IPv6 address and port
    V6(SocketAddrV6),
    /// A family this crate does not implement (raw family code)
    Unspecified {
        /// Raw address family number reported by the resolver
        family: u16,
    },
}

impl CandidateAddress {
    /// Build from a literal IP string of the declared family
    pub fn parse_literal(literal: &str, family: AddressFamily, port: u16) -> Result<Self> {
        match family {
            AddressFamily::Inet => literal
                .parse::<Ipv4Addr>()
                .map(|ip| CandidateAddress::V4(SocketAddrV4::new(ip, port)))
                .map_err(|_| Error::InvalidAddress(format!("'{}' is not an IPv4 address", literal))),
            AddressFamily::Inet6 => literal
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<Ipv6Addr>()
                .map(|ip| CandidateAddress::V6(SocketAddrV6::new(ip, port, 0, 0)))
                .map_err(|_| Error::InvalidAddress(format!("'{}' is not an IPv6 address", literal))),
            AddressFamily::Unspecified => Err(Error::UnsupportedAddressFamily(format!(
                "cannot build a literal address for family {}",
                family
            ))),
        }
    }

    /// Address family tag
    pub fn family(&self) -> AddressFamily {
        match self {
            CandidateAddress::V4(_) => AddressFamily::Inet,
            CandidateAddress::V6(_) => AddressFamily::Inet6,
            CandidateAddress::Unspecified { .. } => AddressFamily::Unspecified,
        }
    }

    /// Whether establishment can attempt this candidate
    pub fn is_supported(&self) -> bool {
        !matches!(self, CandidateAddress::Unspecified { .. })
    }

    /// Resolved port, 0 for unsupported families
    pub fn port(&self) -> u16 {
        match self {
            CandidateAddress::V4(addr) => addr.port(),
            CandidateAddress::V6(addr) => addr.port(),
            CandidateAddress::Unspecified { .. } => 0,
        }
    }

    /// Standard library socket address, if the family is supported
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            CandidateAddress::V4(addr) => Some(SocketAddr::V4(*addr)),
            CandidateAddress::V6(addr) => Some(SocketAddr::V6(*addr)),
            CandidateAddress::Unspecified { .. } => None,
        }
    }

    /// IP address, if the family is supported
    pub fn ip(&self) -> Option<IpAddr> {
        self.socket_addr().map(|addr| addr.ip())
    }

    /// Family-specific binary form suitable for low-level connect calls
    pub fn sock_addr(&self) -> Option<SockAddr> {
        self.socket_addr().map(SockAddr::from)
    }

    /// Length of the binary form in bytes
    pub fn socklen(&self) -> Option<u32> {
        self.sock_addr().map(|addr| addr.len() as u32)
    }
}

impl From<SocketAddr> for CandidateAddress {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => CandidateAddress::V4(v4),
            SocketAddr::V6(v6) => CandidateAddress::V6(v6),
        }
    }
}

impl fmt::Display for CandidateAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateAddress::V4(addr) => write!(f, "{}", addr),
            CandidateAddress::V6(addr) => write!(f, "{}", addr),
            CandidateAddress::Unspecified { family } => write!(f, "<family {}>", family),
        }
    }
}
