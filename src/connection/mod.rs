//! Connection management
//!
//! This module handles:
//! * Candidate addresses and resolution
//! * Establishment (ordered candidate fallback, literal addresses)
//! * Transport abstraction (stream vs datagram, plain vs TLS)
//! * Connection lifecycle and state machine
//! * TLS configuration and support

mod address;
mod conn;
mod establish;
mod resolver;
mod state;
mod tls;
mod transport;

pub use address::{AddressFamily, CandidateAddress, Service, SocketKind};
pub use conn::{Connection, ConnectionConfig, ConnectionConfigBuilder, DEFAULT_READ_CHUNK_SIZE};
pub use establish::{establish, establish_literal};
pub use resolver::{lookup_service, Resolver, StaticResolver, SystemResolver};
pub use state::ConnectionState;
pub use tls::{parse_server_name, TlsConfig, TlsConfigBuilder};
pub use transport::{StreamVariant, Transport};
