//! # Logging
//!
//! Subscriber installation for applications that do not bring their own.

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset or invalid
pub const DEFAULT_DIRECTIVE: &str = "stark=info";

/// Install a global `tracing` subscriber
///
/// Reads `RUST_LOG`, falling back to [`DEFAULT_DIRECTIVE`]. Returns `false`
/// if a subscriber was already installed.
pub fn init_tracing(json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
