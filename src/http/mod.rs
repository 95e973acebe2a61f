//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (hyper HTTP/1.1 with upgrades, axum router)
//!     → websocket.rs (upgrade middleware, channel task)
//!     → broadcast.rs (channel set, fan-out)
//!
//! Host application
//!     → route.rs (GET <route>/reload.js)
//!     → client_script.rs (templated once)
//! ```

pub mod broadcast;
pub mod client_script;
pub mod route;
pub mod server;
pub mod websocket;

pub use broadcast::{ChannelSet, ChannelState, Delivery, UpgradedChannel};
pub use route::{normalize_route, RouteTarget};
