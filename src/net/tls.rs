//! Client-side TLS upgrade.
//!
//! Peer verification is disabled: targets are arbitrary hosts under test,
//! often with self-signed certificates. Signatures are still checked so the
//! handshake itself stays well-formed.

use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::error::{ChainError, ChainResult};
use crate::net::connection::Stream;

/// Build a client config that accepts any server certificate.
pub fn insecure_client_config() -> ChainResult<Arc<ClientConfig>> {
    let provider = Arc::new(ring::default_provider());
    let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| ChainError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Run a TLS handshake over `stream`, using `host` as the SNI hint.
pub async fn upgrade<S>(stream: S, host: &str, timeout: Duration) -> ChainResult<TlsStream<S>>
where
    S: Stream,
{
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| ChainError::Tls(format!("invalid server name {host:?}: {e}")))?;
    let connector = TlsConnector::from(insecure_client_config()?);

    match tokio::time::timeout(timeout, connector.connect(server_name, stream)).await {
        Ok(Ok(tls)) => {
            tracing::debug!(
                host = %host,
                version = ?tls.get_ref().1.protocol_version(),
                "TLS handshake complete"
            );
            Ok(tls)
        }
        Ok(Err(e)) => Err(ChainError::Tls(format!("handshake with {host} failed: {e}"))),
        Err(_) => Err(ChainError::Tls(format!(
            "handshake with {host} timed out after {:.1}s",
            timeout.as_secs_f64()
        ))),
    }
}

/// A `ServerCertVerifier` that trusts every certificate.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
