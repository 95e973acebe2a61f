//! Raw connection registry for forced shutdown.
//!
//! # Responsibilities
//! - Record every accepted transport connection, upgraded or not
//! - Drop the record when the connection's I/O object is dropped
//! - Abruptly terminate every tracked socket on shutdown
//!
//! Each record keeps a duplicated handle of the socket, so termination
//! reaches the connection even after hyper has handed the I/O object to a
//! WebSocket task.

use std::io;
use std::net::{Shutdown, SocketAddr};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

/// Global counter telling apart successive connections with the same identity.
static CONNECTION_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Registry key for a peer: `ip:port`.
pub fn connection_identity(peer: &SocketAddr) -> String {
    format!("{}:{}", peer.ip(), peer.port())
}

/// A tracked transport connection.
#[derive(Debug)]
pub struct ConnectionRecord {
    pub identity: String,
    pub peer: SocketAddr,
    pub accepted_at: Instant,
    serial: u64,
    socket: std::net::TcpStream,
}

impl ConnectionRecord {
    /// Shut both directions of the socket down without any close handshake.
    fn terminate(&self) {
        if let Err(e) = self.socket.shutdown(Shutdown::Both) {
            // NotConnected when the peer already went away.
            tracing::trace!(identity = %self.identity, error = %e, "Socket already closed");
            return;
        }
        tracing::debug!(
            peer = %self.peer,
            open_for_ms = self.accepted_at.elapsed().as_millis() as u64,
            "Connection terminated"
        );
    }
}

/// Map of open transport connections keyed by identity.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    records: DashMap<String, ConnectionRecord>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted connection.
    ///
    /// A record with the same identity is overwritten. The returned stream
    /// removes the record when dropped.
    pub fn track(
        self: &Arc<Self>,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> io::Result<TrackedStream> {
        let std_stream = stream.into_std()?;
        let socket = std_stream.try_clone()?;
        let stream = TcpStream::from_std(std_stream)?;

        let identity = connection_identity(&peer);
        let serial = CONNECTION_SERIAL.fetch_add(1, Ordering::Relaxed);
        self.records.insert(
            identity.clone(),
            ConnectionRecord {
                identity: identity.clone(),
                peer,
                accepted_at: Instant::now(),
                serial,
                socket,
            },
        );
        tracing::trace!(identity = %identity, serial, "Connection tracked");

        Ok(TrackedStream {
            inner: stream,
            _guard: ConnectionGuard {
                registry: Arc::clone(self),
                identity,
                serial,
            },
        })
    }

    /// Number of open tracked connections.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.records.contains_key(identity)
    }

    /// Forcibly terminate every tracked connection and empty the registry.
    ///
    /// Returns how many connections were terminated.
    pub fn terminate_all(&self) -> usize {
        let mut terminated = 0;
        self.records.retain(|_, record| {
            record.terminate();
            terminated += 1;
            false
        });
        terminated
    }

    /// Remove a record, unless it was already replaced by a newer connection.
    pub(crate) fn release(&self, identity: &str, serial: u64) {
        if self
            .records
            .remove_if(identity, |_, record| record.serial == serial)
            .is_some()
        {
            tracing::trace!(identity = %identity, serial, "Connection closed");
        }
    }
}

/// Removes its registry record on drop.
#[derive(Debug)]
struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    identity: String,
    serial: u64,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.release(&self.identity, self.serial);
    }
}

/// A TCP stream whose registry record lives exactly as long as it does.
#[derive(Debug)]
pub struct TrackedStream {
    inner: TcpStream,
    _guard: ConnectionGuard,
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TrackedStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}
