//! Tracing and diagnostics setup for binaries and integration harnesses.
//!
//! Libraries embedding ragloom normally install their own subscriber; these
//! helpers exist for executables and examples that want the standard stack
//! with one call each.

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// Respects `RUST_LOG`; falls back to `info` for this crate and `warn`
/// elsewhere. Calling this twice panics (the second registry refuses to
/// install), so keep it at the top of `main`.
pub fn init_tracing() {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn,ragloom=info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}

/// Install the miette panic hook for pretty panic reports.
pub fn init_diagnostics() {
    miette::set_panic_hook();
}
