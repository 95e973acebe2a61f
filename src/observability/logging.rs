//! Structured logging setup for binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "reload_server=info,tower_http=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, or the default filter.
///
/// `verbose` lowers the default to debug for this crate.
pub fn init(verbose: bool) {
    let fallback = if verbose {
        "reload_server=debug,tower_http=debug"
    } else {
        DEFAULT_FILTER
    };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
