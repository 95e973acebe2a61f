//! Shutdown coordination for the reload service.

use std::sync::Arc;

use crate::error::ReloadError;
use crate::net::listener::ListenerManager;

/// Tears down a standalone listener without waiting for clients.
///
/// Sockets are terminated abruptly, so connections stuck mid-handshake or
/// idle upgraded channels cannot hold the shutdown open.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    listener: Arc<ListenerManager>,
}

impl ShutdownCoordinator {
    pub fn new(listener: Arc<ListenerManager>) -> Self {
        Self { listener }
    }

    /// Terminate every tracked connection, then close the listener.
    ///
    /// Resolves once the listening socket is gone. Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<(), ReloadError> {
        let registry = self.listener.registry();

        let mut terminated = registry.terminate_all();
        let was_listening = self.listener.close().await?;
        // Connections accepted while the accept loop was winding down.
        terminated += registry.terminate_all();

        if was_listening {
            tracing::info!(terminated, "Reload listener shut down");
        }
        Ok(())
    }
}
