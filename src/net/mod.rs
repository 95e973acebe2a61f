//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop)
//!     → connection.rs (registry record, dropped with the stream)
//!     → tls.rs (optional TLS handshake)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Every accepted connection is tracked, whether it upgrades or not
//! - TLS is optional and chosen by the credential kind

pub mod connection;
pub mod listener;
pub mod tls;
