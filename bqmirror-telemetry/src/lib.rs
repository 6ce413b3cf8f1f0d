use std::sync::Once;

use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("failed to set the global tracing subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),
}

/// Initializes the global tracing subscriber for a binary.
///
/// The filter is read from `RUST_LOG` and falls back to `info` when the
/// variable is unset or invalid.
pub fn init_tracing(service_name: &str) -> Result<(), TracingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(service = service_name, "tracing initialized");

    Ok(())
}

static TEST_TRACING: Once = Once::new();

/// Initializes tracing for tests.
///
/// Output is only produced when the `ENABLE_TRACING` environment variable is
/// set, so test runs stay quiet by default. Safe to call from every test.
pub fn init_test_tracing() {
    TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
