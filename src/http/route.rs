//! Bootstrap script route: path normalization and registration on a host app.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use axum::{http::header, routing::get, Router};

use crate::error::ReloadError;

/// File name every normalized route ends with.
pub const SCRIPT_FILE: &str = "reload.js";

/// Content type the bootstrap script is served with.
pub const SCRIPT_CONTENT_TYPE: &str = "text/javascript";

/// Normalize a user supplied route so it ends in exactly one `/reload.js`.
///
/// Everything from the first case-insensitive `reload.js` onwards is cut,
/// a `/` is added if missing, then `reload.js` is appended.
pub fn normalize_route(route: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `route`.
    let lowered = route.to_ascii_lowercase();
    let base = match lowered.find(SCRIPT_FILE) {
        Some(idx) => &route[..idx],
        None => route,
    };

    let mut normalized = String::with_capacity(base.len() + SCRIPT_FILE.len() + 1);
    normalized.push_str(base);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized.push_str(SCRIPT_FILE);
    normalized
}

/// A host application that can serve the bootstrap script.
pub trait RouteTarget {
    /// Register a GET handler at `path` answering with `body` as `content_type`.
    fn register_get(
        &mut self,
        path: &str,
        content_type: &'static str,
        body: Arc<str>,
    ) -> Result<(), ReloadError>;
}

impl RouteTarget for Router {
    fn register_get(
        &mut self,
        path: &str,
        content_type: &'static str,
        body: Arc<str>,
    ) -> Result<(), ReloadError> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        check_static_path(&path)?;

        let handler = move || {
            let body = Arc::clone(&body);
            async move { ([(header::CONTENT_TYPE, content_type)], body.to_string()) }
        };

        // axum panics on a GET handler that overlaps one already registered.
        let router = self.clone();
        let registered = panic::catch_unwind(AssertUnwindSafe(|| router.route(&path, get(handler))))
            .map_err(|cause| {
                ReloadError::RouteRegistration(format!(
                    "route {:?} rejected by router: {}",
                    path,
                    panic_message(cause.as_ref())
                ))
            })?;
        *self = registered;

        tracing::debug!(route = %path, "Bootstrap script route registered");
        Ok(())
    }
}

/// Reject paths axum would read as captures, wildcards or pre-0.8 captures.
fn check_static_path(path: &str) -> Result<(), ReloadError> {
    let dynamic = path.contains(['{', '}', '*'])
        || path.split('/').any(|segment| segment.starts_with(':'));
    if dynamic {
        return Err(ReloadError::RouteRegistration(format!(
            "route {:?} contains path parameter syntax",
            path
        )));
    }
    Ok(())
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(msg) = cause.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg
    } else {
        "unknown conflict"
    }
}
