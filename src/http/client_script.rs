//! Bootstrap script served to browsers.
//!
//! The script is rendered once when the service is built; every request
//! gets the same cached body.

use std::sync::Arc;

use crate::config::ServiceConfig;

const CLIENT_TEMPLATE: &str = include_str!("../../assets/reload-client.js");

const VERBOSE_OFF: &str = "verboseLogging = false";
const VERBOSE_ON: &str = "verboseLogging = true";
const URL_PLACEHOLDER: &str = "socketUrl.replace()";

/// Render the client script for a configuration.
pub fn render(config: &ServiceConfig) -> Arc<str> {
    render_template(CLIENT_TEMPLATE, config)
}

fn render_template(template: &str, config: &ServiceConfig) -> Arc<str> {
    let mut code = if config.verbose {
        template.replacen(VERBOSE_OFF, VERBOSE_ON, 1)
    } else {
        template.to_string()
    };

    // $2 keeps the page's "s" in https, $3 is "host:", $4 the page port.
    let scheme = if config.force_secure_scheme {
        "wss://$3"
    } else {
        "ws$2://$3"
    };
    let port = match config.socket_port() {
        Some(port) => port.to_string(),
        None => "$4".to_string(),
    };
    let rewrite = format!(
        "socketUrl.replace(/(^http(s?):\\/\\/)(.*:)(.*)/,'{}{}')",
        scheme, port
    );
    code = code.replacen(URL_PLACEHOLDER, &rewrite, 1);

    Arc::from(code)
}
