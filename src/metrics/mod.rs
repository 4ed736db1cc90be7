//! Metrics for connection establishment and I/O
//!
//! Thin wrappers over the `metrics` facade. Nothing is recorded unless the
//! application installs a recorder.

/// Label values
pub mod labels {
    /// IPv4 family label
    pub const FAMILY_INET: &str = "inet";
    /// IPv6 family label
    pub const FAMILY_INET6: &str = "inet6";
    /// Unspecified family label
    pub const FAMILY_UNSPEC: &str = "unspec";

    /// Plaintext transport label
    pub const TRANSPORT_PLAIN: &str = "plain";
    /// TLS transport label
    pub const TRANSPORT_TLS: &str = "tls";
    /// Datagram transport label
    pub const TRANSPORT_DATAGRAM: &str = "datagram";

    /// Close requested by the caller
    pub const CLOSE_EXPLICIT: &str = "explicit";
    /// Close triggered by a data handler
    pub const CLOSE_HANDLER: &str = "handler";
    /// Close triggered by a read error
    pub const CLOSE_ERROR: &str = "error";
    /// Close triggered by drop
    pub const CLOSE_DROP: &str = "drop";
}

/// Counter metrics
pub mod counters {
    /// A connect attempt was made against one candidate
    pub fn connect_attempted(family: &'static str) {
        metrics::counter!("connsock_connect_attempts_total", "family" => family).increment(1);
    }

    /// A connection was established
    pub fn connection_established(family: &'static str, transport: &'static str) {
        metrics::counter!(
            "connsock_connections_established_total",
            "family" => family,
            "transport" => transport
        )
        .increment(1);
    }

    /// Establishment failed
    pub fn connect_failed(reason: &'static str) {
        metrics::counter!("connsock_connect_failures_total", "reason" => reason).increment(1);
    }

    /// A TLS handshake failed
    pub fn handshake_failed() {
        metrics::counter!("connsock_handshake_failures_total").increment(1);
    }

    /// Bytes received
    pub fn bytes_read(n: usize) {
        metrics::counter!("connsock_bytes_read_total").increment(n as u64);
    }

    /// Bytes sent
    pub fn bytes_written(n: usize) {
        metrics::counter!("connsock_bytes_written_total").increment(n as u64);
    }

    /// A connection was closed
    pub fn connection_closed(reason: &'static str) {
        metrics::counter!("connsock_connections_closed_total", "reason" => reason).increment(1);
    }
}

/// Histogram metrics
pub mod histograms {
    /// Time from first candidate attempt to an established (and secured) connection
    pub fn connect_duration(ms: u64) {
        metrics::histogram!("connsock_connect_duration_ms").record(ms as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        counters::connect_attempted(labels::FAMILY_INET);
        counters::connection_established(labels::FAMILY_INET6, labels::TRANSPORT_TLS);
        counters::bytes_read(42);
        histograms::connect_duration(7);
    }
}
