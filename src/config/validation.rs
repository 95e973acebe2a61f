//! Configuration validation.
//!
//! Turns a `ReloadOptions` into a `ServiceConfig`. Pure function, runs
//! before any socket is opened or file is read.

use crate::config::schema::{
    CredentialSource, HttpsOptions, Mode, ReloadOptions, ServiceConfig, DEFAULT_PORT, DEFAULT_ROUTE,
};
use crate::error::ReloadError;
use crate::http::route::normalize_route;

/// Validate options for the given mode.
pub fn validate(options: &ReloadOptions, mode: Mode) -> Result<ServiceConfig, ReloadError> {
    let port = match options.port {
        None | Some(0) => DEFAULT_PORT,
        Some(p) => u16::try_from(p)
            .map_err(|_| ReloadError::config(format!("port {} is out of range", p)))?,
    };

    let tls = options.https.as_ref().map(credential_source).transpose()?;

    let route_path = match options.route.as_deref() {
        Some(route) => normalize_route(route),
        None => DEFAULT_ROUTE.to_string(),
    };

    Ok(ServiceConfig {
        port,
        attach: mode == Mode::Attached,
        tls,
        force_secure_scheme: options.force_wss.unwrap_or(false),
        verbose: options.verbose.unwrap_or(false),
        defer_start: options.web_socket_server_wait_start.unwrap_or(false),
        route_path,
    })
}

/// Pick the TLS branch. PKCS12 wins when both are present.
fn credential_source(https: &HttpsOptions) -> Result<CredentialSource, ReloadError> {
    if let Some(p12) = &https.p12 {
        return Ok(CredentialSource::Pkcs12 {
            path_or_bytes: p12.p12_path.clone(),
            passphrase: p12.passphrase.clone().filter(|p| !p.is_empty()),
        });
    }
    if let Some(pair) = &https.cert_and_key {
        return Ok(CredentialSource::KeyCert {
            key: pair.key.clone(),
            cert: pair.cert.clone(),
        });
    }
    Err(ReloadError::config(
        "https options must define either `p12` or `certAndKey`",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CertAndKeyOptions, P12Options, PathOrBytes};

    #[test]
    fn defaults_apply() {
        let config = validate(&ReloadOptions::default(), Mode::Standalone).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn zero_port_means_default() {
        let options = ReloadOptions {
            port: Some(0),
            ..Default::default()
        };
        assert_eq!(validate(&options, Mode::Standalone).unwrap().port, DEFAULT_PORT);
    }

    #[test]
    fn out_of_range_port_rejected() {
        for port in [-1, 70_000] {
            let options = ReloadOptions {
                port: Some(port),
                ..Default::default()
            };
            assert!(validate(&options, Mode::Standalone)
                .unwrap_err()
                .is_configuration());
        }
    }

    #[test]
    fn empty_https_rejected() {
        let options = ReloadOptions {
            https: Some(HttpsOptions::default()),
            ..Default::default()
        };
        let err = validate(&options, Mode::Standalone).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("certAndKey"));
    }

    #[test]
    fn p12_preferred_over_cert_and_key() {
        let options = ReloadOptions {
            https: Some(HttpsOptions {
                p12: Some(P12Options {
                    p12_path: PathOrBytes::Text("cert.p12".into()),
                    passphrase: Some(String::new()),
                }),
                cert_and_key: Some(CertAndKeyOptions {
                    key: "key.pem".into(),
                    cert: "cert.pem".into(),
                }),
            }),
            ..Default::default()
        };
        let config = validate(&options, Mode::Standalone).unwrap();
        assert_eq!(
            config.tls,
            Some(CredentialSource::Pkcs12 {
                path_or_bytes: PathOrBytes::Text("cert.p12".into()),
                passphrase: None,
            })
        );
    }

    #[test]
    fn attached_mode_has_no_socket_port() {
        let options = ReloadOptions {
            route: Some("assets".into()),
            ..Default::default()
        };
        let config = validate(&options, Mode::Attached).unwrap();
        assert!(config.attach);
        assert_eq!(config.socket_port(), None);
        assert_eq!(config.route_path, "assets/reload.js");
    }
}
