//! Logging setup using `tracing-subscriber`.
//!
//! Console-only: the tool keeps no state across runs, so there is no
//! log file either. Verbosity comes from `RUST_LOG` (default: `info`).

use tracing_subscriber::EnvFilter;

/// Initialise stderr logging. Call once at startup.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
