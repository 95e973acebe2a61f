//! Observability subsystem.
//!
//! # Design Decisions
//! - Uses tracing for structured logging throughout the library
//! - The library never installs a subscriber; binaries call `logging::init`
//! - `verbose` raises connection and broadcast events to info level

pub mod logging;
