//! Live-reload notification service.
//!
//! Browsers load a small bootstrap script from the host application and
//! open a WebSocket back to this service. Calling [`ReloadHandle::reload`]
//! tells every open page to refresh.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod service;

pub use config::{Mode, ReloadOptions, ServiceConfig};
pub use error::ReloadError;
pub use http::RouteTarget;
pub use service::{reload, ReloadHandle, RELOAD_MESSAGE};
