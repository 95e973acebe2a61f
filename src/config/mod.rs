//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! JSON value / TOML file
//!     → loader.rs (deserialize into ReloadOptions)
//!     → validation.rs (ranges, TLS branch, route normalization)
//!     → ServiceConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Wrong option types fail before any I/O happens
//! - Every option has a default so an empty bag is valid

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::load_options;
pub use schema::{CredentialSource, HttpsOptions, Mode, PathOrBytes, ReloadOptions, ServiceConfig};
pub use validation::validate;
