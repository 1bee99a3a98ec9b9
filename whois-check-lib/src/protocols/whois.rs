//! WHOIS protocol client (RFC 3912).
//!
//! WHOIS is a single-line query over TCP port 43 followed by an unframed text
//! answer that ends when the server closes the connection. This client does
//! exactly one exchange per call and never retries; retry policy belongs to
//! the orchestrator.

use crate::error::{NetworkErrorKind, WhoisCheckError};
use crate::types::{RawResponse, ServerAddress};
use std::io;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Upper bound on bytes kept from one response.
pub const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

/// WHOIS client for raw protocol exchanges.
///
/// Holds no connection state, so it is cheap to clone and share between
/// concurrent lookups.
#[derive(Debug, Clone, Default)]
pub struct WhoisClient {
    _private: (),
}

impl WhoisClient {
    /// Create a new WHOIS client.
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Send `query` to `server` and read the full answer.
    ///
    /// The connect, the write and the read to end-of-stream must all finish
    /// within `timeout`.
    ///
    /// # Errors
    ///
    /// - `NetworkError { kind: Timeout }` when `timeout` elapses
    /// - `NetworkError { kind: Connect }` when the host does not resolve or
    ///   refuses the connection
    /// - `NetworkError { kind: Reset }` when an established connection fails
    pub async fn query(
        &self,
        server: &ServerAddress,
        query: &str,
        timeout: Duration,
    ) -> Result<RawResponse, WhoisCheckError> {
        let start_time = Instant::now();

        let result = tokio::time::timeout(timeout, exchange(server, query)).await;

        match result {
            Ok(Ok(text)) => {
                debug!(
                    server = %server,
                    bytes = text.len(),
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    "WHOIS query complete"
                );
                Ok(RawResponse::new(server.clone(), text))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(WhoisCheckError::network(
                server.to_string(),
                NetworkErrorKind::Timeout,
                format!("no complete answer within {:?}", timeout),
            )),
        }
    }
}

async fn exchange(server: &ServerAddress, query: &str) -> Result<String, WhoisCheckError> {
    let mut stream = TcpStream::connect((server.host(), server.port()))
        .await
        .map_err(|e| io_error(server, NetworkErrorKind::Connect, e))?;

    stream
        .write_all(format!("{}\r\n", query).as_bytes())
        .await
        .map_err(|e| io_error(server, NetworkErrorKind::Reset, e))?;

    let mut buf = Vec::new();
    (&mut stream)
        .take(MAX_RESPONSE_BYTES)
        .read_to_end(&mut buf)
        .await
        .map_err(|e| io_error(server, NetworkErrorKind::Reset, e))?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn io_error(server: &ServerAddress, kind: NetworkErrorKind, err: io::Error) -> WhoisCheckError {
    let kind = match err.kind() {
        io::ErrorKind::TimedOut => NetworkErrorKind::Timeout,
        io::ErrorKind::ConnectionRefused => NetworkErrorKind::Connect,
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            NetworkErrorKind::Reset
        }
        _ => kind,
    };
    WhoisCheckError::network(server.to_string(), kind, err.to_string())
}
