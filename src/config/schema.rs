//! Configuration schema definitions.
//!
//! `ReloadOptions` is the loosely-typed option bag callers hand in (from
//! code, JSON or TOML). It keeps the historical camelCase option names.
//! `ServiceConfig` is the validated, immutable form the service runs on.

use serde::{Deserialize, Serialize};

/// Port the standalone listener binds when none is given.
pub const DEFAULT_PORT: u16 = 9856;

/// Route the bootstrap script is served at when none is given.
pub const DEFAULT_ROUTE: &str = "/reload/reload.js";

/// Options accepted by [`crate::reload`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadOptions {
    /// Port of the standalone listener. `0` or absent means the default.
    pub port: Option<i64>,

    /// Serve the standalone listener over TLS.
    pub https: Option<HttpsOptions>,

    /// Make the client connect with `wss://` regardless of page scheme.
    pub force_wss: Option<bool>,

    /// Log connections and broadcasts at info level, and turn on client logging.
    pub verbose: Option<bool>,

    /// Do not start the listener until `start_listener` is called.
    pub web_socket_server_wait_start: Option<bool>,

    /// Route of the bootstrap script on the host application.
    pub route: Option<String>,
}

/// TLS section of the options. Exactly one branch is expected.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsOptions {
    pub p12: Option<P12Options>,
    pub cert_and_key: Option<CertAndKeyOptions>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct P12Options {
    /// Either a path to the archive or the archive itself.
    pub p12_path: PathOrBytes,
    pub passphrase: Option<String>,
}

/// PEM key and certificate, each either inline text or a file path.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CertAndKeyOptions {
    pub key: String,
    pub cert: String,
}

/// A PKCS12 archive given as text (usually a path) or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PathOrBytes {
    Text(String),
    Bytes(Vec<u8>),
}

/// Where TLS key material comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Pkcs12 {
        path_or_bytes: PathOrBytes,
        passphrase: Option<String>,
    },
    KeyCert {
        key: String,
        cert: String,
    },
}

/// Whether the service owns its listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Bind a new listener on the configured port.
    #[default]
    Standalone,
    /// Reuse a listener owned by the caller; see [`crate::ReloadHandle::attach`].
    Attached,
}

/// Validated service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    pub attach: bool,
    pub tls: Option<CredentialSource>,
    pub force_secure_scheme: bool,
    pub verbose: bool,
    pub defer_start: bool,
    /// Already normalized, always ends in `reload.js`.
    pub route_path: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            attach: false,
            tls: None,
            force_secure_scheme: false,
            verbose: false,
            defer_start: false,
            route_path: DEFAULT_ROUTE.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Port the client script should target, `None` when attached.
    pub fn socket_port(&self) -> Option<u16> {
        if self.attach {
            None
        } else {
            Some(self.port)
        }
    }
}
