//! Transport security for [`HttpListener`](crate::listener::HttpListener).
//!
//! A [`TlsConfig`] is built once from PEM encoded material and shared by every accepted
//! connection.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::{self, ServerConfig, SupportedProtocolVersion};

use crate::ensure;
use crate::protocol::ListenError;

/// TLS protocol versions a secure listener may negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

impl TlsVersion {
    fn supported(self) -> &'static SupportedProtocolVersion {
        match self {
            TlsVersion::Tls12 => &rustls::version::TLS12,
            TlsVersion::Tls13 => &rustls::version::TLS13,
        }
    }
}

#[derive(Clone)]
pub struct TlsConfig {
    server_config: Arc<ServerConfig>,
}

impl TlsConfig {
    /// Builds a configuration from a PEM certificate chain and a PEM private key.
    ///
    /// An empty `versions` slice enables every version rustls enables by default.
    pub fn from_pem(cert_chain: &[u8], private_key: &[u8], versions: &[TlsVersion]) -> Result<Self, ListenError> {
        let certs = rustls_pemfile::certs(&mut &cert_chain[..]).collect::<Result<Vec<_>, _>>()?;
        ensure!(!certs.is_empty(), ListenError::tls("no certificate found in pem"));

        let key = rustls_pemfile::private_key(&mut &private_key[..])?
            .ok_or_else(|| ListenError::tls("no private key found in pem"))?;

        let versions = if versions.is_empty() {
            rustls::DEFAULT_VERSIONS.to_vec()
        } else {
            versions.iter().map(|version| version.supported()).collect()
        };

        let server_config = ServerConfig::builder_with_protocol_versions(&versions)
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(ListenError::tls)?;

        Ok(Self { server_config: Arc::new(server_config) })
    }

    /// Reads the certificate chain and private key from PEM files.
    pub fn from_pem_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        versions: &[TlsVersion],
    ) -> Result<Self, ListenError> {
        let cert_chain = std::fs::read(cert_path)?;
        let private_key = std::fs::read(key_path)?;
        Self::from_pem(&cert_chain, &private_key, versions)
    }

    pub(crate) fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(Arc::clone(&self.server_config))
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig").field("alpn_protocols", &self.server_config.alpn_protocols).finish_non_exhaustive()
    }
}
