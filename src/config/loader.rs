//! Option loading from JSON values and TOML documents.

use std::fs;
use std::path::Path;

use crate::config::schema::ReloadOptions;
use crate::error::ReloadError;

impl ReloadOptions {
    /// Parse options from a JSON value. Wrongly-typed fields are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ReloadError> {
        match value {
            serde_json::Value::Null => Ok(Self::default()),
            serde_json::Value::Object(_) => serde_json::from_value(value.clone())
                .map_err(|e| ReloadError::config(format!("invalid options: {}", e))),
            _ => Err(ReloadError::config("options must be an object")),
        }
    }

    /// Parse options from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ReloadError> {
        toml::from_str(content).map_err(|e| ReloadError::config(format!("parse error: {}", e)))
    }
}

/// Load options from a TOML file.
pub fn load_options(path: &Path) -> Result<ReloadOptions, ReloadError> {
    let content = fs::read_to_string(path)?;
    ReloadOptions::from_toml_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_uses_original_option_names() {
        let options = ReloadOptions::from_json(&json!({
            "port": 9900,
            "forceWss": true,
            "verbose": false,
            "webSocketServerWaitStart": true,
            "route": "/static"
        }))
        .unwrap();
        assert_eq!(options.port, Some(9900));
        assert_eq!(options.force_wss, Some(true));
        assert_eq!(options.web_socket_server_wait_start, Some(true));
        assert_eq!(options.route.as_deref(), Some("/static"));
    }

    #[test]
    fn string_port_is_configuration_error() {
        let err = ReloadOptions::from_json(&json!({ "port": "9856" })).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn string_flags_are_configuration_errors() {
        for key in ["forceWss", "verbose", "webSocketServerWaitStart"] {
            let err = ReloadOptions::from_json(&json!({ key: "yes" })).unwrap_err();
            assert!(err.is_configuration(), "{key} should be rejected");
        }
    }

    #[test]
    fn non_object_rejected() {
        assert!(ReloadOptions::from_json(&json!(42)).is_err());
        assert!(ReloadOptions::from_json(&json!(null)).is_ok());
    }

    #[test]
    fn toml_with_cert_and_key() {
        let options = ReloadOptions::from_toml_str(
            r#"
            port = 9443
            verbose = true

            [https.certAndKey]
            key = "/etc/reload/key.pem"
            cert = "/etc/reload/cert.pem"
            "#,
        )
        .unwrap();
        assert_eq!(options.port, Some(9443));
        let pair = options.https.unwrap().cert_and_key.unwrap();
        assert_eq!(pair.cert, "/etc/reload/cert.pem");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = load_options(Path::new("/nonexistent/reload.toml")).unwrap_err();
        assert!(matches!(err, ReloadError::Io(_)));
    }
}
