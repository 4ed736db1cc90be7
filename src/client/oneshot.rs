//! One-shot request/response helper

use crate::connection::{Connection, ConnectionConfig, Service, TlsConfig};
use crate::Result;
use bytes::Bytes;

/// Connect, send `request`, read one response of up to `expected_size` bytes,
/// hand it to `callback`, then close.
///
/// The connection is always closed before this returns, whether the read
/// produced data, end-of-stream (`None`) or an error. On a write or read error
/// the callback is not invoked and the error is returned. `expected_size` of
/// zero reads the default chunk size. With `secure` set, the server
/// certificate is verified against the system roots.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> connsock::Result<()> {
/// connsock::oneshot(false, "localhost", "echo", b"ping", 64, |reply| {
///     println!("{:?}", reply);
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn oneshot<F>(
    secure: bool,
    host: &str,
    service: impl Into<Service>,
    request: &[u8],
    expected_size: usize,
    callback: F,
) -> Result<()>
where
    F: FnOnce(Option<Bytes>),
{
    let mut config = ConnectionConfig::default();
    if secure {
        config.tls = Some(TlsConfig::builder().build()?);
    }
    oneshot_with(host, service, &config, request, expected_size, callback).await
}

/// [`oneshot`] with an explicit connection config
pub async fn oneshot_with<F>(
    host: &str,
    service: impl Into<Service>,
    config: &ConnectionConfig,
    request: &[u8],
    expected_size: usize,
    callback: F,
) -> Result<()>
where
    F: FnOnce(Option<Bytes>),
{
    let mut conn = Connection::connect(host, service, config).await?;
    exchange(&mut conn, request, expected_size, callback).await
}

/// Write, read once, report, close
pub(crate) async fn exchange<F>(
    conn: &mut Connection,
    request: &[u8],
    expected_size: usize,
    callback: F,
) -> Result<()>
where
    F: FnOnce(Option<Bytes>),
{
    let outcome = match conn.write(request).await {
        Ok(_) => conn.read_bytes(expected_size).await,
        Err(e) => Err(e),
    };
    let result = outcome.map(callback);
    conn.close();
    tracing::debug!(id = %conn.id(), ok = result.is_ok(), "oneshot finished");
    result
}
