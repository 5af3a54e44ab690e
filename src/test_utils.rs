//! Test utilities
//!
//! Shared tracing setup so test output honors RUST_LOG.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a fmt subscriber once across all tests
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
