//! HTTP serving for reload connections.
//!
//! # Responsibilities
//! - Build the standalone router (upgrade middleware + 426 fallback)
//! - Layer the upgrade middleware onto a caller-owned router
//! - Serve one accepted connection over HTTP/1.1 with upgrades

use std::net::SocketAddr;

use axum::{
    extract::ConnectInfo,
    http::StatusCode,
    middleware,
    Router,
};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;

use crate::http::websocket::{intercept_upgrade, UpgradeState};
use crate::net::tls::{Io, TlsAcceptor};

/// Router of a standalone listener. Only upgrades are served.
pub fn standalone_router(state: UpgradeState) -> Router {
    Router::new()
        .fallback(|| async { (StatusCode::UPGRADE_REQUIRED, "Upgrade Required") })
        .layer(middleware::from_fn_with_state(state, intercept_upgrade))
        .layer(TraceLayer::new_for_http())
}

/// Put the upgrade middleware in front of every route of `router`.
pub fn attach_router(router: Router, state: UpgradeState) -> Router {
    router.layer(middleware::from_fn_with_state(state, intercept_upgrade))
}

/// Serve a single connection until it closes or is upgraded away.
pub async fn serve_connection<S: Io>(
    stream: S,
    peer: SocketAddr,
    router: Router,
    tls: Option<TlsAcceptor>,
) {
    let io: Box<dyn Io> = match tls {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "TLS handshake failed");
                return;
            }
        },
        None => Box::new(stream),
    };

    let service = service_fn(move |mut request: hyper::Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        router.clone().oneshot(request)
    });

    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(io), service)
        .with_upgrades()
        .await
    {
        tracing::debug!(peer = %peer, error = %e, "Connection ended with error");
    }
}
