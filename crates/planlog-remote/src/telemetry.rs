//! Tracing bootstrap

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber
///
/// Uses `filter` when given, otherwise `RUST_LOG`, otherwise `info`.
/// Returns `false` when a subscriber was already installed; calling this
/// more than once is harmless.
pub fn init_tracing(filter: Option<&str>) -> bool {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Same as [`init_tracing`] with JSON output
pub fn init_json_tracing(filter: Option<&str>) -> bool {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
