//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use http_chain::http::request::{Request, RequestRules};

/// A mock server bound to an ephemeral port that records what it receives.
#[derive(Clone)]
pub struct MockServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Vec<u8>>>>,
}

#[allow(dead_code)]
impl MockServer {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn hits(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Every request received so far, decoded lossily.
    pub fn requests(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .collect()
    }
}

/// Build a complete response with a matching Content-Length.
#[allow(dead_code)]
pub fn http_response(status: &str, content_type: Option<&str>, body: &str) -> String {
    let content_type = content_type
        .map(|ct| format!("Content-Type: {ct}\r\n"))
        .unwrap_or_default();
    format!(
        "HTTP/1.1 {status}\r\n{content_type}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Start a mock backend that returns a fixed response.
#[allow(dead_code)]
pub async fn start_mock_backend(response: String) -> MockServer {
    start_programmable_backend(move |_, _| response.clone()).await
}

/// Start a programmable mock backend.
///
/// `f` receives the zero-based hit number and the raw request and returns
/// the raw reply. The connection is shut down after the reply is written.
pub async fn start_programmable_backend<F>(f: F) -> MockServer
where
    F: Fn(usize, &[u8]) -> String + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let server = MockServer {
        addr,
        received: Arc::clone(&received),
    };

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = Arc::clone(&f);
                    let received = Arc::clone(&received);
                    tokio::spawn(async move {
                        let request = read_request(&mut socket).await;
                        let hit = {
                            let mut received = received.lock().unwrap();
                            received.push(request.clone());
                            received.len() - 1
                        };
                        let reply = f(hit, &request);
                        let _ = socket.write_all(reply.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    server
}

/// Read one request: headers plus `Content-Length` bytes of body.
pub async fn read_request<S>(socket: &mut S) -> Vec<u8>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return buf;
            }
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return buf,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// TLS acceptor with a freshly generated self-signed certificate.
fn self_signed_acceptor() -> TlsAcceptor {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert = CertificateDer::from(certified.cert.der().to_vec());
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));
    let config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// Start a TLS backend with a self-signed certificate.
///
/// With `tunnel` set it first plays an HTTP proxy: the CONNECT request is
/// recorded and answered with `200 Connection established`, then TLS is
/// terminated on the same socket. Every plaintext request received
/// (CONNECT included) is recorded.
#[allow(dead_code)]
pub async fn start_tls_backend(response: String, tunnel: bool) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let acceptor = self_signed_acceptor();

    let server = MockServer {
        addr,
        received: Arc::clone(&received),
    };

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            let received = Arc::clone(&received);
            let response = response.clone();
            tokio::spawn(async move {
                if tunnel {
                    let connect = read_request(&mut socket).await;
                    received.lock().unwrap().push(connect);
                    if socket
                        .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                let Ok(mut tls) = acceptor.accept(socket).await else {
                    return;
                };
                let request = read_request(&mut tls).await;
                received.lock().unwrap().push(request);
                let _ = tls.write_all(response.as_bytes()).await;
                let _ = tls.shutdown().await;
            });
        }
    });

    server
}

/// Plain-HTTP request aimed at `server`, with a short timeout.
#[allow(dead_code)]
pub fn plain_request(raw: &str, server: &MockServer, rules: RequestRules) -> Request {
    Request::parse(
        raw.as_bytes(),
        Some("127.0.0.1"),
        Some(server.port()),
        Arc::new(RequestRules {
            use_tls: false,
            timeout: Duration::from_secs(2),
            ..rules
        }),
    )
    .unwrap()
}
