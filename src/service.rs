//! Service entry point and the handle returned to callers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use crate::config::{validate, Mode, ReloadOptions, ServiceConfig};
use crate::error::ReloadError;
use crate::http::broadcast::{ChannelSet, Delivery};
use crate::http::client_script;
use crate::http::route::{RouteTarget, SCRIPT_CONTENT_TYPE};
use crate::http::server::attach_router;
use crate::http::websocket::UpgradeState;
use crate::lifecycle::ShutdownCoordinator;
use crate::net::listener::ListenerManager;

/// Message sent by [`ReloadHandle::reload`].
pub const RELOAD_MESSAGE: &str = "reload";

/// Build the reload service.
///
/// `target` receives the bootstrap script route (standalone mode only) and
/// must be present. In standalone mode the listener is bound before this
/// returns, unless `webSocketServerWaitStart` is set. In attached mode no
/// listener is created; use [`ReloadHandle::attach`] on the caller's router.
pub async fn reload<T>(
    target: Option<&mut T>,
    options: &ReloadOptions,
    mode: Mode,
) -> Result<ReloadHandle, ReloadError>
where
    T: RouteTarget + ?Sized,
{
    let target =
        target.ok_or_else(|| ReloadError::config("lack of/invalid arguments provided to reload"))?;
    let config = Arc::new(validate(options, mode)?);
    let script = client_script::render(&config);

    if !config.attach {
        target.register_get(&config.route_path, SCRIPT_CONTENT_TYPE, Arc::clone(&script))?;
    }

    let channels = Arc::new(ChannelSet::new(config.verbose));
    let accepting = !(config.attach && config.defer_start);
    let upgrade = UpgradeState::new(Arc::clone(&channels), config.verbose, accepting);

    let listener = if config.attach {
        None
    } else {
        let manager = Arc::new(ListenerManager::new(Arc::clone(&config), upgrade.clone()));
        Some((Arc::clone(&manager), ShutdownCoordinator::new(manager)))
    };

    let handle = ReloadHandle {
        config,
        script,
        channels,
        upgrade,
        listener,
    };

    if !handle.config.defer_start {
        handle.start().await?;
    }
    Ok(handle)
}

/// Caller-side handle to a running (or deferred) reload service.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    config: Arc<ServiceConfig>,
    script: Arc<str>,
    channels: Arc<ChannelSet>,
    upgrade: UpgradeState,
    listener: Option<(Arc<ListenerManager>, ShutdownCoordinator)>,
}

impl ReloadHandle {
    /// Tell every open client to reload.
    pub fn reload(&self) -> Delivery {
        self.broadcast(RELOAD_MESSAGE)
    }

    /// Send `message` to every open channel. Never fails.
    pub fn broadcast(&self, message: &str) -> Delivery {
        self.channels.broadcast(message)
    }

    /// Upgraded channels, read-only.
    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Tracked raw connections. `None` in attached mode.
    pub fn connection_count(&self) -> Option<usize> {
        self.listener
            .as_ref()
            .map(|(manager, _)| manager.registry().len())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Address of the standalone listener once it is running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            Some((manager, _)) => manager.local_addr().await,
            None => None,
        }
    }

    /// Start a deferred service.
    pub async fn start_listener(&self) -> Result<(), ReloadError> {
        if !self.config.defer_start {
            return Err(ReloadError::Start(
                "only available with webSocketServerWaitStart".into(),
            ));
        }
        self.start().await
    }

    async fn start(&self) -> Result<(), ReloadError> {
        match &self.listener {
            Some((manager, _)) => {
                manager.start().await?;
            }
            None => {
                self.upgrade.start_accepting();
                if self.config.verbose {
                    tracing::info!("Reload attached to existing server");
                }
            }
        }
        Ok(())
    }

    /// The rendered bootstrap script. Attached mode only.
    pub fn reload_client_code(&self) -> Option<Arc<str>> {
        self.config.attach.then(|| Arc::clone(&self.script))
    }

    /// Layer the upgrade handler onto a caller-owned router.
    pub fn attach(&self, router: Router) -> Router {
        attach_router(router, self.upgrade.clone())
    }

    /// Terminate all connections and close the listener.
    ///
    /// No-op in attached mode, where the caller owns the listener.
    pub async fn shutdown(&self) -> Result<(), ReloadError> {
        match &self.listener {
            Some((_, coordinator)) => coordinator.shutdown().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingTarget {
        routes: Vec<(String, &'static str, Arc<str>)>,
    }

    impl RouteTarget for RecordingTarget {
        fn register_get(
            &mut self,
            path: &str,
            content_type: &'static str,
            body: Arc<str>,
        ) -> Result<(), ReloadError> {
            self.routes.push((path.to_string(), content_type, body));
            Ok(())
        }
    }

    struct NoRoutes;

    impl RouteTarget for NoRoutes {
        fn register_get(&mut self, _: &str, _: &'static str, _: Arc<str>) -> Result<(), ReloadError> {
            Err(ReloadError::RouteRegistration("not an app".into()))
        }
    }

    fn deferred() -> ReloadOptions {
        ReloadOptions::from_json(&json!({ "webSocketServerWaitStart": true, "route": "/js" }))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_target_is_configuration_error() {
        let err = reload::<RecordingTarget>(None, &ReloadOptions::default(), Mode::Standalone)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn route_failure_surfaces() {
        let err = reload(Some(&mut NoRoutes), &deferred(), Mode::Standalone)
            .await
            .unwrap_err();
        assert!(matches!(err, ReloadError::RouteRegistration(_)));
    }

    #[tokio::test]
    async fn deferred_standalone_registers_route_without_binding() {
        let mut target = RecordingTarget::default();
        let handle = reload(Some(&mut target), &deferred(), Mode::Standalone)
            .await
            .unwrap();

        assert_eq!(target.routes.len(), 1);
        assert_eq!(target.routes[0].0, "/js/reload.js");
        assert_eq!(target.routes[0].1, SCRIPT_CONTENT_TYPE);
        assert_eq!(handle.local_addr().await, None);
        assert_eq!(handle.connection_count(), Some(0));
        assert!(handle.reload_client_code().is_none());

        handle.reload();
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn attached_mode_skips_route_and_listener() {
        let mut target = RecordingTarget::default();
        let handle = reload(Some(&mut target), &ReloadOptions::default(), Mode::Attached)
            .await
            .unwrap();

        assert!(target.routes.is_empty());
        assert_eq!(handle.connection_count(), None);
        assert_eq!(handle.local_addr().await, None);
        assert!(handle.reload_client_code().unwrap().contains("$4"));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn start_listener_requires_deferral() {
        let mut target = RecordingTarget::default();
        let handle = reload(Some(&mut target), &ReloadOptions::default(), Mode::Attached)
            .await
            .unwrap();
        assert!(matches!(
            handle.start_listener().await,
            Err(ReloadError::Start(_))
        ));
    }
}
