//! Gateway connections.
//!
//! `Connector` is the seam between the client loops and the network: the
//! production implementation speaks TLS with a client certificate, tests plug
//! in in-memory streams.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

use crate::config::{ApnsConfig, Endpoint};
use crate::errors::{ApnsError, TransportError};

/// Bidirectional byte stream to the gateway.
pub trait GatewayStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> GatewayStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type BoxedStream = Box<dyn GatewayStream>;

/// Opens connections to a gateway endpoint
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream, TransportError>;
}

/// TLS connector authenticating with the configured client certificate.
#[derive(Clone)]
pub struct TlsGatewayConnector {
    connector: TlsConnector,
    connect_timeout: Duration,
}

impl TlsGatewayConnector {
    pub fn from_config(cfg: &ApnsConfig) -> Result<Self, ApnsError> {
        let certs = load_certificates(&cfg.certificate_path)?;
        let key_path = cfg
            .private_key_path
            .as_deref()
            .unwrap_or(&cfg.certificate_path);
        let key = load_private_key(key_path)?;

        let roots = match &cfg.ca_certificate_path {
            Some(path) => {
                let mut roots = RootCertStore::empty();
                for cert in load_certificates(path)? {
                    roots
                        .add(cert)
                        .map_err(|e| ApnsError::Certificate(format!("invalid CA certificate: {e}")))?;
                }
                roots
            }
            None => native_roots()?,
        };

        let client_config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)
            .map_err(|e| ApnsError::Tls(e.to_string()))?;

        info!(
            certificate = %cfg.certificate_path.display(),
            production = cfg.is_production,
            "Loaded APNs client certificate"
        );

        Ok(Self {
            connector: TlsConnector::from(Arc::new(client_config)),
            connect_timeout: cfg.connect_timeout(),
        })
    }
}

#[async_trait::async_trait]
impl Connector for TlsGatewayConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<BoxedStream, TransportError> {
        let tcp = timeout(
            self.connect_timeout,
            TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            operation: "TCP connect",
            endpoint: endpoint.to_string(),
        })?
        .map_err(|source| TransportError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })?;
        tcp.set_nodelay(true)?;

        let server_name = ServerName::try_from(endpoint.host.clone())
            .map_err(|e| TransportError::InvalidServerName(e.to_string()))?;

        let tls = timeout(self.connect_timeout, self.connector.connect(server_name, tcp))
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "TLS handshake",
                endpoint: endpoint.to_string(),
            })?
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        debug!(endpoint = %endpoint, "TLS session established");
        Ok(Box::new(tls))
    }
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, ApnsError> {
    let file = File::open(path)
        .map_err(|e| ApnsError::Certificate(format!("{}: {e}", path.display())))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApnsError::Certificate(format!("{}: {e}", path.display())))?;

    if certs.is_empty() {
        return Err(ApnsError::Certificate(format!(
            "{}: no certificates found",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ApnsError> {
    let file = File::open(path)
        .map_err(|e| ApnsError::PrivateKey(format!("{}: {e}", path.display())))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| ApnsError::PrivateKey(format!("{}: {e}", path.display())))?
        .ok_or_else(|| ApnsError::PrivateKey(format!("{}: no private key found", path.display())))
}

fn native_roots() -> Result<RootCertStore, ApnsError> {
    let certs = rustls_native_certs::load_native_certs()
        .map_err(|e| ApnsError::Certificate(format!("failed to load native roots: {e}")))?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if ignored > 0 {
        warn!(added, ignored, "Skipped unparsable native root certificates");
    }
    Ok(roots)
}

/// Read until `buf` is full or the peer closes the stream.
///
/// Returns the number of bytes read; `0` means the stream was already closed,
/// anything short of `buf.len()` means it closed mid-frame.
pub(crate) async fn read_frame<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
