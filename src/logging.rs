//! Logging and tracing setup for metascope
//!
//! Diagnostics go to stderr so that the JSON report on stdout stays clean.
//!
//! # Log Levels
//!
//! - `info`  - rejected input, run completion (default in release)
//! - `debug` - stage start/finish with byte counts (default in debug builds)
//! - `warn`  - an extractor swallowed a parse failure or timed out
//! - `trace` - per-box / per-IFD parser detail
//!
//! # Environment Variable Control
//!
//! ```bash
//! RUST_LOG=debug metascope photo.jpg
//! RUST_LOG=metascope::extractors=trace metascope clip.mp4
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn default_filter() -> EnvFilter {
    if cfg!(debug_assertions) || cfg!(feature = "debug-logging") {
        EnvFilter::new("metascope=debug")
    } else {
        EnvFilter::new("metascope=info")
    }
}

/// Initialize the global subscriber. A second call is a no-op.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize with file:line and thread ids, trace level unless RUST_LOG says otherwise
pub fn init_verbose() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("metascope=trace"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .pretty(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_noop() {
        init();
        init();
        init_verbose();
        tracing::info!("logging initialised");
    }
}
