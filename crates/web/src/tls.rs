//! TLS termination for [`Server`](crate::Server).
//!
//! Certificates and the private key are read from PEM files once, when the server is
//! built; every accepted connection then goes through the same acceptor.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::{self, ServerConfig};

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no certificate found in {}", path.display())]
    MissingCertificate { path: PathBuf },

    #[error("no private key found in {}", path.display())]
    MissingPrivateKey { path: PathBuf },

    #[error("invalid tls configuration: {source}")]
    Rustls {
        #[from]
        source: rustls::Error,
    },
}

/// Builds an acceptor serving the certificate chain in `cert` with the key in `key`.
pub(crate) fn load_acceptor(cert: &Path, key: &Path) -> Result<TlsAcceptor, TlsError> {
    let certs = load_certs(cert)?;
    let key = load_private_key(key)?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Io { path: path.to_owned(), source })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io { path: path.to_owned(), source })?;

    if certs.is_empty() {
        return Err(TlsError::MissingCertificate { path: path.to_owned() });
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io { path: path.to_owned(), source })?
        .ok_or_else(|| TlsError::MissingPrivateKey { path: path.to_owned() })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const CERT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/resources/tls/cert.pem");
    pub(crate) const KEY: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/resources/tls/key.pem");

    #[test]
    fn loads_pem_certificate_and_key() {
        load_acceptor(Path::new(CERT), Path::new(KEY)).unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = load_acceptor(Path::new("/nonexistent/cert.pem"), Path::new(KEY));
        assert!(matches!(result, Err(TlsError::Io { .. })));
    }

    #[test]
    fn swapped_files_are_reported() {
        let result = load_acceptor(Path::new(KEY), Path::new(KEY));
        assert!(matches!(result, Err(TlsError::MissingCertificate { .. })));

        let result = load_acceptor(Path::new(CERT), Path::new(CERT));
        assert!(matches!(result, Err(TlsError::MissingPrivateKey { .. })));
    }
}
