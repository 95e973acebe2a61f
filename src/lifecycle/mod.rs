//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (service.rs):
//!     Validate options → Register script route → Bind listener (or defer)
//!
//! Shutdown (shutdown.rs):
//!     Terminate tracked sockets → Stop accept loop → Drop listener
//! ```
//!
//! # Design Decisions
//! - Forced, not graceful: open channels are cut without a close handshake
//! - No timeout: completion depends only on the accept loop exiting

pub mod shutdown;

pub use shutdown::ShutdownCoordinator;
