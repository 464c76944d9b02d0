//! Standardized logging setup for the window server.
//!
//! All subsystems log through `tracing` with one of the target constants
//! below so filters like `RUST_LOG=wsd::input=trace` stay stable. The
//! subscriber prints `YYYY-MM-DD HH:MM:SS LEVEL target: message`.

use tracing_subscriber::EnvFilter;

/// Standardized module identifiers, used as `tracing` targets.
pub const SERVER: &str = "wsd::server";
pub const INPUT: &str = "wsd::input";
pub const KEYMAP: &str = "wsd::keymap";
pub const WINDOW: &str = "wsd::window";
pub const REGISTRY: &str = "wsd::registry";
pub const BUFFER: &str = "wsd::buffer";
pub const CONFIG: &str = "wsd::config";

const DEFAULT_FILTER: &str = "info,wsd=debug";

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(
            "%Y-%m-%d %H:%M:%S".to_string(),
        ))
        .with_ansi(false)
        .try_init();
}
