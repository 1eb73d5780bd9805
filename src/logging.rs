//! Logging initialization.
//!
//! Logs go to stderr so stdout stays free for the run report.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise dependencies log at `warn` and this
/// crate at `info`, or `debug` with `verbose`.
pub fn init(verbose: bool, json_format: bool) {
    let default_filter = if verbose {
        "warn,lumina=debug"
    } else {
        "warn,lumina=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
