//! Diagnostic tracing for the client.
//!
//! Tracing output is for debugging the controller and transport (`RUST_LOG`).
//! Run progress and summaries are product output and go through the CLI
//! output writer instead.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Reads `RUST_LOG`, defaults to `warn`, and
/// writes compact lines to stderr.
///
/// ```bash
/// RUST_LOG=heal_cli=debug heal-cli --repo-url https://github.com/org/repo
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
