//! Connection state machine

use crate::{Error, Result};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Raw socket connected, plaintext I/O
    Connected,

    /// TLS handshake in progress
    Handshaking,

    /// TLS session established, encrypted I/O
    Secured,

    /// Closed; the descriptor has been released
    Closed,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Connected, Handshaking) | (Handshaking, Secured) | (Connected | Handshaking | Secured, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidState {
                expected: format!("valid transition from {:?}", self),
                actual: format!("{:?}", next),
            });
        }
        *self = next;
        Ok(())
    }

    /// Whether read and write are permitted
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Secured)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Handshaking => write!(f, "handshaking"),
            Self::Secured => write!(f, "secured"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
