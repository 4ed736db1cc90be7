//! Error types

use std::io;
use thiserror::Error;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error outside of read/write/connect
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No usable address could be produced for the target
    #[error("address resolution failed: {0}")]
    Resolution(String),

    /// The resolver produced only address families this crate does not implement
    #[error("unsupported address family: {0}")]
    UnsupportedAddressFamily(String),

    /// A literal address could not be parsed for the declared family
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Every candidate failed (or the literal connect failed)
    ///
    /// `source` is the last underlying OS error.
    #[error("connect failed after {attempts} attempt(s): {source}")]
    Connect {
        /// Number of candidates that were tried
        attempts: usize,
        /// Last OS error observed
        #[source]
        source: io::Error,
    },

    /// TLS negotiation failed after the raw connect succeeded
    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    /// Plaintext receive failed
    #[error("recv: {0}")]
    Read(#[source] io::Error),

    /// Send failed (plaintext or TLS)
    #[error("send: {0}")]
    Write(#[source] io::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation not valid in the current connection state
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Operation attempted on a closed connection
    #[error("connection closed")]
    ConnectionClosed,
}

impl Error {
    /// Static label for this error's kind, used in logs and metrics
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Resolution(_) => "resolution",
            Error::UnsupportedAddressFamily(_) => "unsupported_family",
            Error::InvalidAddress(_) => "invalid_address",
            Error::Connect { .. } => "connect",
            Error::Handshake(_) => "handshake",
            Error::Read(_) => "read",
            Error::Write(_) => "write",
            Error::Config(_) => "config",
            Error::InvalidState { .. } => "invalid_state",
            Error::ConnectionClosed => "closed",
        }
    }

    /// Whether the failure happened while establishing the connection
    pub fn is_establishment_error(&self) -> bool {
        matches!(
            self,
            Error::Resolution(_)
                | Error::UnsupportedAddressFamily(_)
                | Error::InvalidAddress(_)
                | Error::Connect { .. }
                | Error::Handshake(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_carries_os_text() {
        let err = Error::Read(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(err.to_string().starts_with("recv: "));
        assert_eq!(err.category(), "read");
    }

    #[test]
    fn test_connect_error_display() {
        let err = Error::Connect {
            attempts: 2,
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let msg = err.to_string();
        assert!(msg.contains("2 attempt(s)"));
        assert!(err.is_establishment_error());
    }

    #[test]
    fn test_io_errors_are_not_establishment_errors() {
        assert!(!Error::ConnectionClosed.is_establishment_error());
        assert!(!Error::Write(io::Error::from(io::ErrorKind::BrokenPipe)).is_establishment_error());
    }
}
