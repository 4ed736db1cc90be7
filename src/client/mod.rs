//! High-level client helpers
//!
//! This module provides:
//! * [`Endpoint`] URIs (`tcp://`, `tls://`, `udp://`)
//! * [`oneshot`], a single request/response exchange

mod endpoint;
mod oneshot;

pub use endpoint::{Endpoint, Scheme};
pub use oneshot::{oneshot, oneshot_with};
