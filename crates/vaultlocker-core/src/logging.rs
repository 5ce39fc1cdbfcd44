//! Process-wide logger setup.
//!
//! Everything logs through the `log` facade. Output goes to stderr so that
//! stdout stays reserved for values scripts consume (the provisioned
//! identifier). Key material must never be passed to a logging macro.

use std::env;
use std::sync::Once;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "VAULTLOCKER_LOG";

static INIT: Once = Once::new();

/// Install the logger once; later calls are no-ops.
///
/// The filter comes from `VAULTLOCKER_LOG`, then `RUST_LOG`, then `default_level`.
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let filter = resolve_filter(default_level);
        let _ = env_logger::Builder::new()
            .parse_filters(&filter)
            .format_timestamp_secs()
            .target(env_logger::Target::Stderr)
            .try_init();
    });
}

/// Logger for unit and integration tests; captured by the test harness.
pub fn init_test() {
    let _ = env_logger::Builder::new()
        .parse_filters(&resolve_filter("debug"))
        .is_test(true)
        .try_init();
}

fn resolve_filter(default_level: &str) -> String {
    [LOG_ENV, "RUST_LOG"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| default_level.to_string())
}
