//! Shared helpers for the `sitepipe` integration tests.

pub mod builders;
pub mod fake_executor;
pub mod fixtures;

use std::sync::Once;

use sitepipe::logging::LOG_ENV_VAR;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Output is captured per test and only shown for failures. The filter is
/// read from `SITEPIPE_LOG`, then `RUST_LOG`, and defaults to `info`:
/// `SITEPIPE_LOG=sitepipe::engine=debug cargo test --test core_runtime`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}
