//! Raw request/response round-trip.
//!
//! # Data Flow
//! ```text
//! no proxy, plain:  TCP(target)                          → write → read
//! no proxy, TLS:    TCP(target) → TLS                    → write → read
//! proxy, plain:     TCP(proxy)  → absolute-form rewrite  → write → read
//! proxy, TLS:       TCP(proxy)  → CONNECT → TLS          → write → read
//! ```

use std::borrow::Cow;
use std::time::Duration;

use crate::config::schema::ProxyConfig;
use crate::error::ChainResult;
use crate::net::connection::{connect_tcp, Connection, Stream};
use crate::net::{proxy, tls};

/// Send `raw` to `host:port` and return every byte the peer replied with.
///
/// The reply ends at EOF or at the first read that exceeds `timeout`.
/// No integrity check is made on what was accumulated.
pub async fn send_http_request(
    host: &str,
    port: u16,
    raw: &[u8],
    timeout: Duration,
    use_tls: bool,
    proxy_config: Option<&ProxyConfig>,
) -> ChainResult<Vec<u8>> {
    let (connect_host, connect_port) = match proxy_config {
        Some(p) => (p.host.as_str(), p.port),
        None => (host, port),
    };
    let peer = format!("{connect_host}:{connect_port}");
    let mut tcp = connect_tcp(connect_host, connect_port, timeout).await?;

    let mut payload = Cow::Borrowed(raw);
    let stream: Box<dyn Stream> = match (proxy_config, use_tls) {
        (Some(_), true) => {
            proxy::establish_tunnel(&mut tcp, host, port, timeout).await?;
            Box::new(tls::upgrade(tcp, host, timeout).await?)
        }
        (Some(_), false) => {
            payload = Cow::Owned(proxy::absolute_form(raw, host, port)?);
            Box::new(tcp)
        }
        (None, true) => Box::new(tls::upgrade(tcp, host, timeout).await?),
        (None, false) => Box::new(tcp),
    };

    let mut conn = Connection::new(peer, stream);
    tracing::debug!(
        connection_id = %conn.id(),
        destination = %format!("{host}:{port}"),
        use_tls,
        via_proxy = proxy_config.is_some(),
        bytes = payload.len(),
        "Sending request"
    );

    conn.send(&payload).await?;
    let reply = conn.receive(timeout).await?;
    conn.close().await;
    Ok(reply)
}
