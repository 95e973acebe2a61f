//! Standalone listener lifecycle.
//!
//! # Responsibilities
//! - Resolve TLS credentials and bind the configured port
//! - Register every accepted connection before any protocol work
//! - Hand connections to the HTTP layer
//! - Stop accepting and drop the socket on close

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::error::ReloadError;
use crate::http::server::{serve_connection, standalone_router};
use crate::http::websocket::UpgradeState;
use crate::net::connection::ConnectionRegistry;
use crate::net::tls::{build_tls_acceptor, resolve_credentials, TlsAcceptor};

/// A bound listener and its accept loop.
#[derive(Debug)]
struct RunningListener {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the standalone listener and the raw connection registry.
#[derive(Debug)]
pub struct ListenerManager {
    config: Arc<ServiceConfig>,
    registry: Arc<ConnectionRegistry>,
    upgrade: UpgradeState,
    running: Mutex<Option<RunningListener>>,
}

impl ListenerManager {
    pub fn new(config: Arc<ServiceConfig>, upgrade: UpgradeState) -> Self {
        Self {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            upgrade,
            running: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Bind and start accepting. Returns once the socket is listening.
    pub async fn start(&self) -> Result<SocketAddr, ReloadError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ReloadError::Start("listener is already running".into()));
        }

        let tls = match &self.config.tls {
            Some(source) => Some(build_tls_acceptor(resolve_credentials(source)?).await?),
            None => None,
        };

        if self.config.verbose {
            tracing::info!("Starting WebSocket Server");
        }
        let listener = bind_any(self.config.port).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!(
            address = %local_addr,
            tls = tls.is_some(),
            "Reload listener bound"
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.registry),
            standalone_router(self.upgrade.clone()),
            tls,
            cancel.clone(),
        ));

        *running = Some(RunningListener {
            local_addr,
            cancel,
            task,
        });
        Ok(local_addr)
    }

    /// Address of the running listener.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.local_addr)
    }

    /// Stop accepting and wait until the listening socket is dropped.
    ///
    /// Returns `false` when no listener was running.
    pub async fn close(&self) -> Result<bool, ReloadError> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(false);
        };
        running.cancel.cancel();
        running
            .task
            .await
            .map_err(|e| ReloadError::Shutdown(format!("accept loop failed: {}", e)))?;
        tracing::debug!(address = %running.local_addr, "Reload listener closed");
        Ok(true)
    }
}

/// Bind the unspecified IPv6 address, which also takes IPv4 clients on
/// dual-stack hosts. Hosts without IPv6 get `0.0.0.0` instead.
async fn bind_any(port: u16) -> io::Result<TcpListener> {
    match TcpListener::bind(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port))).await {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => Err(e),
        Err(e) => {
            tracing::debug!(error = %e, "IPv6 bind failed, using IPv4 only");
            TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    router: Router,
    tls: Option<TlsAcceptor>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    // Tracked before TLS and HTTP so stuck handshakes can be killed too.
                    let stream = match registry.track(stream, peer) {
                        Ok(stream) => stream,
                        Err(e) => {
                            tracing::warn!(peer = %peer, error = %e, "Failed to track connection");
                            continue;
                        }
                    };
                    tracing::debug!(peer = %peer, tracked = registry.len(), "Connection accepted");
                    tokio::spawn(serve_connection(stream, peer, router.clone(), tls.clone()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}
