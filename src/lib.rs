pub mod engine;
pub mod error;
pub mod formula;
pub mod model;
pub mod progress;
pub mod settings;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging with a default filter of `info`.
///
/// Use the `RUST_LOG` environment variable to override it.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(false).init();
}
