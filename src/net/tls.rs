//! TLS configuration and certificate loading.

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::{Result, ServerError};

/// Where a certificate or key comes from.
#[derive(Debug, Clone)]
pub enum CertSource {
    /// A PEM file on disk.
    Path(PathBuf),
    /// PEM content held in memory.
    Pem(Vec<u8>),
}

impl CertSource {
    /// Read the PEM bytes.
    pub fn read(&self) -> Result<Vec<u8>> {
        match self {
            CertSource::Path(path) => {
                if !path.exists() {
                    return Err(ServerError::Tls(format!("file not found: {:?}", path)));
                }
                Ok(std::fs::read(path)?)
            }
            CertSource::Pem(content) => Ok(content.clone()),
        }
    }
}

impl From<&Path> for CertSource {
    fn from(path: &Path) -> Self {
        CertSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for CertSource {
    fn from(path: PathBuf) -> Self {
        CertSource::Path(path)
    }
}

impl From<&str> for CertSource {
    fn from(path: &str) -> Self {
        CertSource::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for CertSource {
    fn from(content: Vec<u8>) -> Self {
        CertSource::Pem(content)
    }
}

/// ALPN protocols offered by the TLS listener.
pub fn alpn_protocols(http2: bool) -> Vec<Vec<u8>> {
    let mut protocols = Vec::with_capacity(2);
    if http2 {
        protocols.push(b"h2".to_vec());
    }
    protocols.push(b"http/1.1".to_vec());
    protocols
}

fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(pem))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Tls(format!("invalid certificate: {}", e)))?;
    if certs.is_empty() {
        return Err(ServerError::Tls("no certificate found".to_string()));
    }
    Ok(certs)
}

fn parse_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut BufReader::new(pem))
        .map_err(|e| ServerError::Tls(format!("invalid private key: {}", e)))?
        .ok_or_else(|| ServerError::Tls("no private key found".to_string()))
}

/// Build a rustls server configuration from certificate and key PEM.
pub fn server_config(cert: &CertSource, key: &CertSource, http2: bool) -> Result<rustls::ServerConfig> {
    let certs = parse_certs(&cert.read()?)?;
    let key = parse_key(&key.read()?)?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::Tls(e.to_string()))?;
    config.alpn_protocols = alpn_protocols(http2);
    Ok(config)
}

/// Load TLS configuration for axum-server.
pub fn load_tls_config(cert: &CertSource, key: &CertSource, http2: bool) -> Result<RustlsConfig> {
    let config = server_config(cert, key, http2)?;
    Ok(RustlsConfig::from_config(Arc::new(config)))
}
