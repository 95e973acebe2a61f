//! Error type shared by every subsystem.

use thiserror::Error;

/// Errors surfaced by the reload service.
///
/// Configuration and route errors are raised before any I/O happens.
/// Per-connection failures during broadcast are never reported here.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// Missing or malformed options.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The target could not take the bootstrap script route.
    #[error("could not attach route: {0}")]
    RouteRegistration(String),

    /// Reading credential files or binding the listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Credentials were read but could not be turned into an acceptor.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// `start_listener` called when unavailable.
    #[error("cannot start listener: {0}")]
    Start(String),

    /// The listener did not close cleanly.
    #[error("shutdown failed: {0}")]
    Shutdown(String),
}

impl ReloadError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ReloadError::Configuration(msg.into())
    }

    /// True for errors raised while validating options.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ReloadError::Configuration(_))
    }
}
