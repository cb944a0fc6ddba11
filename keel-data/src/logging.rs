use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Initialize the global tracing subscriber.
///
/// Respects the `RUST_LOG` environment variable. Falls back to
/// [`DEFAULT_FILTER`] when `RUST_LOG` is not set or cannot be parsed.
///
/// Safe to call more than once: later calls are no-ops, which lets tests
/// and applications share it.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
