//! Transport streams for IMAP connections.
//!
//! The client owns its transport as a boxed [`ImapIo`], so STARTTLS and a
//! SASL security layer can replace it in place.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use super::config::{Config, Security};
use crate::{Error, Result};

/// A duplex byte stream usable as an IMAP transport.
pub trait ImapIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ImapIo for T {}

/// An owned, replaceable transport.
pub type BoxedIo = Box<dyn ImapIo>;

/// A boxed future, for object-safe async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opens transports.
pub trait Connector: Send + Sync {
    /// Connects to the configured server, performing the TLS handshake for
    /// [`Security::Implicit`].
    fn connect<'a>(&'a self, config: &'a Config) -> BoxFuture<'a, Result<BoxedIo>>;
}

/// Upgrades a plaintext transport to TLS in place (STARTTLS).
pub trait StreamUpgrader: Send + Sync {
    /// Runs a TLS client handshake over `stream`.
    fn upgrade<'a>(&'a self, stream: BoxedIo, host: &'a str) -> BoxFuture<'a, Result<BoxedIo>>;
}

/// Creates a TLS connector with the webpki root certificates.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// TLS upgrader backed by rustls.
#[derive(Clone)]
pub struct RustlsUpgrader {
    connector: TlsConnector,
}

impl RustlsUpgrader {
    /// Creates an upgrader trusting the webpki root certificates.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connector: create_tls_connector(),
        }
    }

    /// Creates an upgrader from a custom rustls configuration.
    #[must_use]
    pub fn with_config(config: Arc<rustls::ClientConfig>) -> Self {
        Self {
            connector: TlsConnector::from(config),
        }
    }

    async fn handshake(&self, stream: BoxedIo, host: &str) -> Result<BoxedIo> {
        let server_name = ServerName::try_from(host.to_string())?;
        let tls = self.connector.connect(server_name, stream).await?;
        Ok(Box::new(tls))
    }
}

impl Default for RustlsUpgrader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RustlsUpgrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustlsUpgrader").finish_non_exhaustive()
    }
}

impl StreamUpgrader for RustlsUpgrader {
    fn upgrade<'a>(&'a self, stream: BoxedIo, host: &'a str) -> BoxFuture<'a, Result<BoxedIo>> {
        Box::pin(self.handshake(stream, host))
    }
}

/// Connects over TCP, wrapping the socket in TLS for implicit-TLS configs.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    tls: RustlsUpgrader,
}

impl TcpConnector {
    /// Creates a connector using the given TLS upgrader for implicit TLS.
    #[must_use]
    pub const fn with_tls(tls: RustlsUpgrader) -> Self {
        Self { tls }
    }

    async fn open(&self, config: &Config) -> Result<BoxedIo> {
        let addr = format!("{}:{}", config.host, config.port);
        let tcp = TcpStream::connect(&addr).await?;
        tcp.set_nodelay(true)?;
        tracing::debug!(%addr, security = ?config.security, "TCP connection established");

        match config.security {
            Security::Implicit => self.tls.handshake(Box::new(tcp), &config.host).await,
            Security::None | Security::StartTls => Ok(Box::new(tcp)),
        }
    }
}

impl Connector for TcpConnector {
    fn connect<'a>(&'a self, config: &'a Config) -> BoxFuture<'a, Result<BoxedIo>> {
        Box::pin(self.open(config))
    }
}

/// Hands out one pre-connected stream, for custom transports and tests.
///
/// A second connect attempt fails with [`Error::InvalidState`].
pub struct OnceConnector {
    stream: Mutex<Option<BoxedIo>>,
}

impl OnceConnector {
    /// Wraps an already connected stream.
    pub fn new(stream: impl ImapIo + 'static) -> Self {
        Self {
            stream: Mutex::new(Some(Box::new(stream))),
        }
    }
}

impl std::fmt::Debug for OnceConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnceConnector").finish_non_exhaustive()
    }
}

impl Connector for OnceConnector {
    fn connect<'a>(&'a self, _config: &'a Config) -> BoxFuture<'a, Result<BoxedIo>> {
        let stream = self
            .stream
            .lock()
            .map_err(|_| Error::InvalidState("connector lock poisoned".to_string()))
            .and_then(|mut slot| {
                slot.take()
                    .ok_or_else(|| Error::InvalidState("stream already used".to_string()))
            });
        Box::pin(async move { stream })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tls_connector() {
        let _connector = create_tls_connector();
        let _upgrader = RustlsUpgrader::default();
    }

    #[tokio::test]
    async fn test_once_connector_hands_out_one_stream() {
        let mock = tokio_test::io::Builder::new().build();
        let connector = OnceConnector::new(mock);
        let config = Config::new("localhost");
        assert!(connector.connect(&config).await.is_ok());
        assert!(matches!(
            connector.connect(&config).await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_upgrader_rejects_invalid_host() {
        let mock = tokio_test::io::Builder::new().build();
        let result = RustlsUpgrader::new().upgrade(Box::new(mock), "not a host!").await;
        assert!(matches!(result, Err(Error::InvalidDnsName(_))));
    }
}
