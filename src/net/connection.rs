//! Outbound connection lifecycle.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Open TCP connections under a deadline
//! - Write a request and accumulate the reply until EOF or read timeout
//!
//! # Design Decisions
//! - Plain and TLS streams share one boxed `Stream` type
//! - A read timeout ends the response; it is not an error
//! - One request per connection; no reuse

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{ChainError, ChainResult};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

const READ_CHUNK: usize = 4096;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Byte stream usable as a request transport (plain TCP or TLS).
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

/// Open a TCP connection, failing with `Connect` on error or timeout.
pub async fn connect_tcp(host: &str, port: u16, timeout: Duration) -> ChainResult<TcpStream> {
    let addr = format!("{host}:{port}");
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ChainError::Connect {
            addr,
            reason: e.to_string(),
        }),
        Err(_) => Err(ChainError::Connect {
            addr,
            reason: format!("timed out after {:.1}s", timeout.as_secs_f64()),
        }),
    }
}

/// An established connection ready to carry one request.
pub struct Connection {
    id: ConnectionId,
    peer: String,
    stream: Box<dyn Stream>,
}

impl Connection {
    pub fn new(peer: impl Into<String>, stream: Box<dyn Stream>) -> Self {
        Self {
            id: ConnectionId::new(),
            peer: peer.into(),
            stream,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Write the complete request.
    pub async fn send(&mut self, raw: &[u8]) -> ChainResult<()> {
        self.stream.write_all(raw).await?;
        self.stream.flush().await?;
        tracing::trace!(connection_id = %self.id, bytes = raw.len(), "Request written");
        Ok(())
    }

    /// Read until the peer closes the connection or a read times out.
    pub async fn receive(&mut self, timeout: Duration) -> ChainResult<Vec<u8>> {
        let mut response = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match tokio::time::timeout(timeout, self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => response.extend_from_slice(&chunk[..n]),
                // TLS peers frequently close without close_notify
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    tracing::warn!(
                        connection_id = %self.id,
                        peer = %self.peer,
                        timeout_secs = timeout.as_secs_f64(),
                        received = response.len(),
                        "Socket timed out, treating as end of response"
                    );
                    break;
                }
            }
        }
        tracing::trace!(connection_id = %self.id, bytes = response.len(), "Response received");
        Ok(response)
    }

    /// Shut the connection down; errors are irrelevant once the reply is in.
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[tokio::test]
    async fn receive_until_eof() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut conn = Connection::new("duplex", Box::new(client));
        tokio::spawn(async move {
            server.write_all(b"HTTP/1.1 200 OK\r\n\r\nhello").await.unwrap();
        });
        let reply = conn.receive(Duration::from_secs(5)).await.unwrap();
        assert_eq!(reply, b"HTTP/1.1 200 OK\r\n\r\nhello");
    }

    #[tokio::test]
    async fn receive_timeout_returns_partial() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut conn = Connection::new("duplex", Box::new(client));
        server.write_all(b"HTTP/1.1 200 OK\r\n").await.unwrap();
        // keep `server` alive so the read stalls instead of hitting EOF
        let reply = conn.receive(Duration::from_millis(100)).await.unwrap();
        assert_eq!(reply, b"HTTP/1.1 200 OK\r\n");
        drop(server);
    }

    #[tokio::test]
    async fn connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = connect_tcp("127.0.0.1", port, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, ChainError::Connect { .. }));
    }
}
