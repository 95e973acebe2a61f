//! WebSocket upgrade handling.
//!
//! # Responsibilities
//! - Detect WebSocket upgrade requests on any path
//! - Complete the handshake and register the resulting channel
//! - Pump queued broadcast messages to the client
//! - Track channel state until the connection ends
//!
//! The handler is an axum middleware, so it can front the standalone
//! listener's router as well as a router owned by the caller.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, FromRequestParts, Request, State,
    },
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::http::broadcast::{ChannelSet, ChannelState, UpgradedChannel, CHANNEL_QUEUE_DEPTH};

/// State shared by the upgrade middleware.
#[derive(Debug, Clone)]
pub struct UpgradeState {
    pub channels: Arc<ChannelSet>,
    pub verbose: bool,
    accepting: Arc<AtomicBool>,
}

impl UpgradeState {
    pub fn new(channels: Arc<ChannelSet>, verbose: bool, accepting: bool) -> Self {
        Self {
            channels,
            verbose,
            accepting: Arc::new(AtomicBool::new(accepting)),
        }
    }

    /// Start intercepting upgrades. Until then requests pass through.
    pub fn start_accepting(&self) {
        self.accepting.store(true, Ordering::Release);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }
}

/// Whether the request asks for a WebSocket upgrade.
pub fn is_upgrade_request(request: &Request) -> bool {
    request
        .headers()
        .get_all(header::UPGRADE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|p| p.trim().eq_ignore_ascii_case("websocket")))
}

/// Middleware answering upgrade requests; everything else goes to `next`.
pub async fn intercept_upgrade(
    State(state): State<UpgradeState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.is_accepting() || !is_upgrade_request(&request) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let (mut parts, _body) = request.into_parts();

    match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => upgrade.on_upgrade(move |socket| run_channel(socket, peer, state)),
        Err(rejection) => {
            tracing::debug!(peer = ?peer, error = %rejection, "Rejected upgrade request");
            rejection.into_response()
        }
    }
}

/// Drive one upgraded channel until either side closes it.
async fn run_channel(socket: WebSocket, peer: Option<SocketAddr>, state: UpgradeState) {
    let (tx, mut rx) = mpsc::channel(CHANNEL_QUEUE_DEPTH);
    let channel = Arc::new(UpgradedChannel::new(peer, tx));
    state.channels.insert(Arc::clone(&channel));
    channel.set_state(ChannelState::Open);

    if state.verbose {
        tracing::info!(peer = ?peer, channel_id = %channel.id, "Reload client connected to server");
    } else {
        tracing::debug!(peer = ?peer, channel_id = %channel.id, "Reload client connected");
    }

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(text) = outbound else { break };
                if let Err(e) = sink.send(Message::Text(text.to_string().into())).await {
                    tracing::debug!(channel_id = %channel.id, error = %e, "Send failed");
                    break;
                }
            }
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) => {
                    channel.set_state(ChannelState::Closing);
                    let _ = sink.close().await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(channel_id = %channel.id, error = %e, "Receive failed");
                    break;
                }
                None => break,
            }
        }
    }

    channel.set_state(ChannelState::Closed);
    state.channels.remove(&channel.id);
    tracing::debug!(
        channel_id = %channel.id,
        open_for_ms = channel.connected_at.elapsed().as_millis() as u64,
        "Reload client disconnected"
    );
}
