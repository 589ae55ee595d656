use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Environment variable which turns on log output in tests.
const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

static INIT_TEST_TRACING: Once = Once::new();

/// Errors returned by [`init_tracing`].
pub type TracingInitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Installs the global `tracing` subscriber for a service.
///
/// The filter is read from `RUST_LOG` and falls back to `info`. Every event carries the
/// `service` name so that logs of several tools writing to one collector can be told apart.
pub fn init_tracing(service: &'static str) -> Result<(), TracingInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE)
        .try_init()?;

    ::tracing::info!(service, "tracing initialized");

    Ok(())
}

/// Installs a test subscriber once per process.
///
/// Output is only produced when `ENABLE_TRACING` is set, so test runs stay quiet by default.
/// Merge sessions run on two producer threads, so thread names are included to tell the
/// sides apart.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var(ENABLE_TRACING_ENV_NAME).is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("mapdiff=debug"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_names(true)
            .try_init();
    });
}
