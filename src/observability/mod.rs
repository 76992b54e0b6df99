//! Observability subsystem
//!
//! Structured logging through `tracing`. Library code only emits events
//! (at debug/trace level) and never installs a subscriber; the CLI calls
//! [`init_logging`] once at startup.
//!
//! # Principles
//!
//! 1. Every event carries a stable `event` field (see [`Event`])
//! 2. Errors are returned, never logged and swallowed
//! 3. Logging has no side effects on execution

mod events;

pub use events::Event;

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Returns false if a subscriber
/// was already installed.
pub fn init_logging(level: &str, json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
