//! TLS plumbing shared by the status channel and the file transfer client.
//!
//! The printer presents a self-signed certificate that cannot be verified
//! and never answers a TLS `close_notify`. Both quirks are contained here:
//! [`insecure_client_config`] skips certificate validation and
//! [`close_raw`] tears a stream down at the TCP level.

use std::sync::Arc;

use rumqttc::tokio_rustls::client::TlsStream;
use rumqttc::tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rumqttc::tokio_rustls::rustls::crypto::{self, WebPkiSupportedAlgorithms};
use rumqttc::tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rumqttc::tokio_rustls::rustls::{self, ClientConfig, DigitallySignedStruct, SignatureScheme};
use rumqttc::tokio_rustls::TlsConnector;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Accepts any server certificate but still checks handshake signatures,
/// so the session is encrypted even though the peer is not authenticated.
#[derive(Debug)]
struct AcceptAnyServerCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl AcceptAnyServerCert {
    fn new() -> Self {
        Self {
            algorithms: crypto::ring::default_provider().signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for AcceptAnyServerCert {
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
        crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Client config for the printer's closed-network endpoints: no
/// certificate validation, no client certificate.
pub fn insecure_client_config() -> Arc<ClientConfig> {
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert::new()))
        .with_no_client_auth();
    Arc::new(config)
}

pub fn connector() -> TlsConnector {
    TlsConnector::from(insecure_client_config())
}

/// SNI / verification name for a host given as IP or DNS name.
pub fn server_name(host: &str) -> std::io::Result<ServerName<'static>> {
    ServerName::try_from(host.to_string()).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid printer address {host:?}: {e}"),
        )
    })
}

/// Close a TLS stream without the TLS shutdown exchange.
///
/// Pending records are flushed, then only the TCP socket is shut down and
/// dropped. Never waits for the peer.
pub async fn close_raw(mut stream: TlsStream<TcpStream>) {
    let _ = stream.flush().await;
    let (mut tcp, _session) = stream.into_inner();
    let _ = tcp.shutdown().await;
}
