//! Shared utilities for integration tests.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream,
};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a WebSocket to `addr` (host:port).
pub async fn connect_ws(addr: &str) -> Client {
    let (stream, _) = connect_async(format!("ws://{}/", addr))
        .await
        .expect("WebSocket handshake failed");
    stream
}

/// Poll `condition` until it holds, failing after two seconds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Next text frame, failing after two seconds.
pub async fn next_text(client: &mut Client) -> String {
    let message = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("no message in time")
        .expect("stream ended")
        .expect("receive failed");
    message.to_text().expect("not a text frame").to_string()
}

/// Whether another frame shows up within `wait`.
#[allow(dead_code)]
pub async fn receives_within(client: &mut Client, wait: Duration) -> bool {
    matches!(
        tokio::time::timeout(wait, client.next()).await,
        Ok(Some(Ok(_)))
    )
}

/// Plain GET bypassing any proxy configured in the environment.
#[allow(dead_code)]
pub async fn http_get(url: &str) -> reqwest::Response {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
        .get(url)
        .send()
        .await
        .expect("request failed")
}

/// TLS client trusting any certificate, for self-signed test servers.
#[allow(dead_code)]
fn insecure_tls() -> native_tls::TlsConnector {
    native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .expect("TLS connector")
}

/// Open a secure WebSocket to `addr` (host:port).
#[allow(dead_code)]
pub async fn connect_wss(addr: &str) -> Client {
    let (stream, _) = connect_async_tls_with_config(
        format!("wss://{}/", addr),
        None,
        false,
        Some(Connector::NativeTls(insecure_tls())),
    )
    .await
    .expect("secure WebSocket handshake failed");
    stream
}

/// GET over HTTPS, accepting self-signed certificates.
#[allow(dead_code)]
pub async fn https_get(url: &str) -> reqwest::Response {
    reqwest::Client::builder()
        .no_proxy()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap()
        .get(url)
        .send()
        .await
        .expect("request failed")
}

/// Self-signed certificate for `localhost` as (cert PEM, key PEM).
#[allow(dead_code)]
pub fn self_signed_pem() -> (String, String) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .expect("certificate generation");
    (certified.cert.pem(), certified.key_pair.serialize_pem())
}

/// PKCS#12 archive bundling a PEM certificate and key.
#[allow(dead_code)]
pub fn pkcs12_archive(cert_pem: &str, key_pem: &str, passphrase: &str) -> Vec<u8> {
    let key = openssl::pkey::PKey::private_key_from_pem(key_pem.as_bytes()).unwrap();
    let cert = openssl::x509::X509::from_pem(cert_pem.as_bytes()).unwrap();
    openssl::pkcs12::Pkcs12::builder()
        .name("reload-server")
        .pkey(&key)
        .cert(&cert)
        .build2(passphrase)
        .unwrap()
        .to_der()
        .unwrap()
}
