//! Test logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for a test binary.
///
/// Respects `RUST_LOG` and writes through the test capture writer so output
/// only shows for failing tests. Safe to call from every test; later calls
/// are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
