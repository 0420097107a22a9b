//! Socket setup: TCP connect with timeouts, optionally wrapped in TLS.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme, StreamOwned};
use tracing::{debug, warn};

use crate::config::{ServerConfig, TlsMode};
use crate::error::ElectrumError;

/// A byte stream carrying the Electrum session.
///
/// Implemented for plain TCP and TLS-over-TCP; tests implement it for
/// in-memory streams.
pub trait ElectrumStream: Read + Write + Send {
    /// Best-effort orderly shutdown. Errors are ignored; the stream is
    /// dropped right after.
    fn close(&mut self) {}
}

impl ElectrumStream for TcpStream {
    fn close(&mut self) {
        let _ = self.shutdown(Shutdown::Both);
    }
}

impl ElectrumStream for StreamOwned<ClientConnection, TcpStream> {
    fn close(&mut self) {
        self.conn.send_close_notify();
        let _ = self.flush();
        let _ = self.sock.shutdown(Shutdown::Both);
    }
}

/// Open a TCP connection to `server`, trying each resolved address in turn
/// with the configured connect timeout, then apply read/write timeouts.
fn connect_tcp(server: &ServerConfig) -> Result<TcpStream, ElectrumError> {
    let addrs = (server.host.as_str(), server.port).to_socket_addrs()?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, server.connect_timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(server.read_timeout))?;
                stream.set_write_timeout(Some(server.write_timeout))?;
                stream.set_nodelay(true)?;
                debug!(%addr, "tcp connected");
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, error = %e, "tcp connect failed");
                last_err = Some(e);
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} did not resolve", server.host)))
        .into())
}

/// Connect to `server` according to its [`TlsMode`].
///
/// For TLS modes the handshake is driven to completion here so certificate
/// and protocol failures surface from `connect` rather than the first request.
pub fn open(server: &ServerConfig) -> Result<Box<dyn ElectrumStream>, ElectrumError> {
    let mut tcp = connect_tcp(server)?;

    let tls_config = match server.tls {
        TlsMode::Plaintext => return Ok(Box::new(tcp)),
        TlsMode::Verified => verified_config()?,
        TlsMode::AcceptInvalidCerts => {
            warn!(server = %server, "TLS certificate validation disabled for this connection");
            insecure_config()?
        }
    };

    let server_name = ServerName::try_from(server.host.clone())
        .map_err(|e| ElectrumError::Tls(format!("invalid server name {}: {e}", server.host)))?;
    let mut conn = ClientConnection::new(Arc::new(tls_config), server_name)
        .map_err(|e| ElectrumError::Tls(e.to_string()))?;

    while conn.is_handshaking() {
        conn.complete_io(&mut tcp).map_err(|e| match e.kind() {
            // rustls reports handshake alerts and certificate errors as InvalidData.
            io::ErrorKind::InvalidData => ElectrumError::Tls(e.to_string()),
            _ => ElectrumError::Transport(e),
        })?;
    }
    debug!(
        version = ?conn.protocol_version(),
        suite = ?conn.negotiated_cipher_suite().map(|s| s.suite()),
        "tls handshake complete"
    );

    Ok(Box::new(StreamOwned::new(conn, tcp)))
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn verified_config() -> Result<ClientConfig, ElectrumError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    Ok(ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| ElectrumError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

fn insecure_config() -> Result<ClientConfig, ElectrumError> {
    let provider = provider();
    Ok(ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| ElectrumError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
        .with_no_client_auth())
}

/// Accepts any certificate chain and hostname. Handshake signatures are
/// still checked, so the session key is bound to the presented certificate.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

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
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
