//! Endpoint URI parsing
//!
//! Supports formats:
//! * tcp://host:service
//! * tls://host:service
//! * udp://host:service
//! * IPv6 literals in brackets, e.g. tcp://[::1]:8080
//!
//! `service` is a port number or a service name such as `https`.

use crate::connection::{Connection, ConnectionConfig, Service, SocketKind, TlsConfig};
use crate::{Error, Result};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// URI scheme selecting the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plaintext stream
    Tcp,
    /// Stream with a TLS session
    Tls,
    /// Datagram
    Udp,
}

impl Scheme {
    /// Socket kind used by this scheme
    pub fn kind(&self) -> SocketKind {
        match self {
            Scheme::Tcp | Scheme::Tls => SocketKind::Stream,
            Scheme::Udp => SocketKind::Datagram,
        }
    }

    /// Whether the scheme requires encryption
    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Tls)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Scheme::Tcp => "tcp",
            Scheme::Tls => "tls",
            Scheme::Udp => "udp",
        }
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Scheme::Tcp),
            "tls" | "ssl" => Ok(Scheme::Tls),
            "udp" => Ok(Scheme::Udp),
            other => Err(Error::Config(format!("unknown endpoint scheme '{}'", other))),
        }
    }
}

/// A parsed endpoint: scheme, host and service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Transport scheme
    pub scheme: Scheme,
    /// Hostname or IP literal (IPv6 without brackets)
    pub host: String,
    /// Port or service name
    pub service: Service,
}

impl Endpoint {
    /// Parse an endpoint URI
    pub fn parse(s: &str) -> Result<Self> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| Error::Config(format!("endpoint '{}' has no scheme", s)))?;
        let scheme: Scheme = scheme.parse()?;
        let rest = rest.trim_end_matches('/');

        let (host, service) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| Error::Config(format!("unterminated IPv6 literal in '{}'", s)))?;
            let service = after
                .strip_prefix(':')
                .ok_or_else(|| Error::Config(format!("endpoint '{}' has no service", s)))?;
            (host, service)
        } else {
            rest.rsplit_once(':')
                .ok_or_else(|| Error::Config(format!("endpoint '{}' has no service", s)))?
        };

        if host.is_empty() {
            return Err(Error::Config(format!("endpoint '{}' has no host", s)));
        }
        if service.is_empty() {
            return Err(Error::Config(format!("endpoint '{}' has no service", s)));
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            service: Service::from(service),
        })
    }

    /// Derive a config for this endpoint from `base`.
    ///
    /// The socket kind always follows the scheme. A `tls://` endpoint without
    /// TLS settings in `base` gets a verifying client with system roots.
    pub fn config(&self, base: &ConnectionConfig) -> Result<ConnectionConfig> {
        let mut config = base.clone();
        config.kind = self.scheme.kind();
        if self.scheme.is_secure() {
            if config.tls.is_none() {
                config.tls = Some(TlsConfig::builder().build()?);
            }
        } else {
            config.tls = None;
        }
        Ok(config)
    }

    /// Connect to this endpoint
    ///
    /// IP literals bypass resolution; hostnames go through DNS with fallback.
    pub async fn connect(&self, base: &ConnectionConfig) -> Result<Connection> {
        let config = self.config(base)?;
        match self.host.parse::<IpAddr>() {
            Ok(ip) => Connection::connect_literal(ip, self.service.clone(), &config).await,
            Err(_) => Connection::connect(&self.host, self.service.clone(), &config).await,
        }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme.as_str(), self.host, self.service)
        } else {
            write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.service)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tls_service_name() {
        let endpoint = Endpoint::parse("tls://example.com:https").unwrap();
        assert_eq!(endpoint.scheme, Scheme::Tls);
        assert_eq!(endpoint.host, "example.com");
        assert_eq!(endpoint.service, Service::Name("https".into()));
    }

    #[test]
    fn test_parse_numeric_port() {
        let endpoint = Endpoint::parse("tcp://localhost:8080").unwrap();
        assert_eq!(endpoint.scheme, Scheme::Tcp);
        assert_eq!(endpoint.service, Service::Port(8080));
    }

    #[test]
    fn test_parse_ipv6_literal() {
        let endpoint = Endpoint::parse("udp://[::1]:53").unwrap();
        assert_eq!(endpoint.scheme, Scheme::Udp);
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.service, Service::Port(53));
        assert_eq!(endpoint.to_string(), "udp://[::1]:53");
    }

    #[test]
    fn test_parse_errors() {
        assert!(Endpoint::parse("localhost:80").is_err());
        assert!(Endpoint::parse("http://localhost:80").is_err());
        assert!(Endpoint::parse("tcp://localhost").is_err());
        assert!(Endpoint::parse("tcp://:80").is_err());
        assert!(Endpoint::parse("tcp://[::1:80").is_err());
    }

    #[test]
    fn test_config_follows_scheme() {
        let base = ConnectionConfig::builder().tls(TlsConfig::insecure()).build();

        let udp = Endpoint::parse("udp://127.0.0.1:9").unwrap().config(&base).unwrap();
        assert_eq!(udp.kind, SocketKind::Datagram);
        assert!(!udp.is_secure());

        let tls = Endpoint::parse("tls://127.0.0.1:443").unwrap().config(&base).unwrap();
        assert_eq!(tls.kind, SocketKind::Stream);
        assert!(tls.is_secure());
    }

    #[tokio::test]
    async fn test_connect_literal_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let endpoint: Endpoint = format!("tcp://127.0.0.1:{}", port).parse().unwrap();
        let conn = endpoint.connect(&ConnectionConfig::default()).await.unwrap();
        assert_eq!(conn.port(), port);
        assert!(conn.peer_address().is_some());
    }
}
