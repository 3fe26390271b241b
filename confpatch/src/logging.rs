//! Diagnostic tracing for the `confpatch` binary.
//!
//! Warnings that matter to the caller are also returned in
//! [`crate::core::types::ApplyReport`]; tracing output is for debugging only
//! and goes to stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset. Compact output on stderr.
///
/// # Example
/// ```bash
/// RUST_LOG=confpatch=debug confpatch apply node node_update_8001
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
