//! TLS credential resolution and acceptor setup.
//!
//! PEM key/cert pairs go through rustls (via `axum-server`), PKCS#12
//! archives through native-tls since rustls cannot read them.

use std::fs;
use std::io;

use axum_server::accept::Accept;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::{CredentialSource, PathOrBytes};
use crate::error::ReloadError;

/// Byte stream a connection can be served over, plain or encrypted.
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Key material ready for an acceptor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub pfx: Option<Vec<u8>>,
    pub key: Option<Vec<u8>>,
    pub cert: Option<Vec<u8>>,
    pub passphrase: Option<String>,
}

/// Resolve a credential source into bytes, reading files where needed.
pub fn resolve_credentials(source: &CredentialSource) -> Result<ResolvedCredentials, ReloadError> {
    match source {
        CredentialSource::Pkcs12 {
            path_or_bytes,
            passphrase,
        } => {
            let pfx = match path_or_bytes {
                PathOrBytes::Text(text) if looks_like_file_path(text) => fs::read(text)?,
                PathOrBytes::Text(text) => text.as_bytes().to_vec(),
                PathOrBytes::Bytes(bytes) => bytes.clone(),
            };
            Ok(ResolvedCredentials {
                pfx: Some(pfx),
                passphrase: passphrase.clone(),
                ..Default::default()
            })
        }
        CredentialSource::KeyCert { key, cert } => Ok(ResolvedCredentials {
            key: Some(inline_or_file(key)?),
            cert: Some(inline_or_file(cert)?),
            ..Default::default()
        }),
    }
}

/// A name ending in a dot and three word characters, e.g. `server.p12`.
fn looks_like_file_path(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() < 4 {
        return false;
    }
    let (dot, ext) = bytes[bytes.len() - 4..].split_at(1);
    dot[0] == b'.' && ext.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_')
}

/// PEM text always ends with a line terminator; paths never do.
fn is_inline_pem(text: &str) -> bool {
    text.ends_with('\n') || text.ends_with('\r')
}

fn inline_or_file(text: &str) -> Result<Vec<u8>, ReloadError> {
    if is_inline_pem(text) {
        Ok(text.as_bytes().to_vec())
    } else {
        Ok(fs::read(text)?)
    }
}

/// Per-connection TLS handshake, whichever backend the credentials need.
#[derive(Clone)]
pub enum TlsAcceptor {
    /// PEM key and certificate.
    Rustls(RustlsAcceptor),
    /// PKCS#12 archive.
    Native(tokio_native_tls::TlsAcceptor),
}

impl TlsAcceptor {
    /// Complete the server side handshake.
    pub async fn accept<S: Io>(&self, stream: S) -> io::Result<Box<dyn Io>> {
        match self {
            TlsAcceptor::Rustls(acceptor) => {
                let (stream, ()) = acceptor.accept(stream, ()).await?;
                Ok(Box::new(stream))
            }
            TlsAcceptor::Native(acceptor) => {
                let stream = acceptor
                    .accept(stream)
                    .await
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Box::new(stream))
            }
        }
    }
}

/// Build an acceptor from resolved credentials.
pub async fn build_tls_acceptor(creds: ResolvedCredentials) -> Result<TlsAcceptor, ReloadError> {
    if let Some(pfx) = &creds.pfx {
        let identity =
            native_tls::Identity::from_pkcs12(pfx, creds.passphrase.as_deref().unwrap_or(""))
                .map_err(|e| ReloadError::Tls(format!("invalid PKCS#12 archive: {}", e)))?;
        let acceptor = native_tls::TlsAcceptor::new(identity)
            .map_err(|e| ReloadError::Tls(e.to_string()))?;
        tracing::debug!("Using native-tls with PKCS#12 identity");
        return Ok(TlsAcceptor::Native(acceptor.into()));
    }

    match (creds.cert, creds.key) {
        (Some(cert), Some(key)) => {
            check_pem(&cert, &key)?;
            let config = RustlsConfig::from_pem(cert, key)
                .await
                .map_err(|e| ReloadError::Tls(e.to_string()))?;
            tracing::debug!("Using rustls with PEM key and certificate");
            Ok(TlsAcceptor::Rustls(RustlsAcceptor::new(config)))
        }
        _ => Err(ReloadError::config(
            "TLS requires either a PKCS#12 archive or both key and certificate",
        )),
    }
}

/// Fail early with a readable message when PEM blocks are missing.
fn check_pem(cert: &[u8], key: &[u8]) -> Result<(), ReloadError> {
    let certs = rustls_pemfile::certs(&mut &cert[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ReloadError::Tls(format!("unreadable certificate: {}", e)))?;
    if certs.is_empty() {
        return Err(ReloadError::Tls("no certificates found".into()));
    }
    match rustls_pemfile::private_key(&mut &key[..]) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(ReloadError::Tls("no private key found".into())),
        Err(e) => Err(ReloadError::Tls(format!("unreadable private key: {}", e))),
    }
}
