use std::{io::IsTerminal, sync::Once};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static LOG_INIT: Once = Once::new();

/// Filter applied when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Initialize the global tracing subscriber, once per process.
///
/// The filter is read from `RUST_LOG`; when that variable is absent,
/// `default_value` is used, falling back to [`DEFAULT_LOG_FILTER`].
///
/// Events are written to stderr: stdout is reserved for the command payload
/// and the JSON report that calling automation parses.
pub fn log_init(default_value: Option<&str>) {
    LOG_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_value.unwrap_or(DEFAULT_LOG_FILTER)));
        tracing_setup(filter);
    });
}

fn tracing_setup(filter: EnvFilter) {
    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(std::io::stderr().is_terminal())
        .compact();

    // a subscriber may already be installed by a test harness
    drop(
        tracing_subscriber::registry()
            .with(filter)
            .with(format)
            .try_init(),
    );
}

#[cfg(test)]
mod tests {
    use super::log_init;

    #[test]
    fn test_log_init_is_idempotent() {
        log_init(Some("debug"));
        log_init(None);
        tracing::debug!("logger initialized twice without panicking");
    }
}
