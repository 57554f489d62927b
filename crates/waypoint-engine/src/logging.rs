//! Diagnostic logging setup.
//!
//! The engine logs through `tracing`; embedders that already install a
//! subscriber can skip this module entirely.

use tracing_subscriber::EnvFilter;
use waypoint_config::{Config, LaunchConfig};

/// Environment variable holding an `EnvFilter` directive, e.g. `waypoint_engine=trace`.
pub const LOG_ENV: &str = "WAYPOINT_LOG";

/// Install a stderr `fmt` subscriber.
///
/// `WAYPOINT_LOG` wins when set; otherwise `default_level` applies.
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_with_level(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Default filter for a launch: `debug` when verbose diagnostics are on
/// (per request or `[logging] verbose`), otherwise the project's level.
pub fn launch_level<'a>(defaults: &'a Config, launch: &LaunchConfig) -> &'a str {
    if launch.verbose_diagnostic_logging || defaults.verbose_logging() {
        "debug"
    } else {
        defaults.log_level()
    }
}

/// Subscriber for tests: debug level, output captured by the test harness.
pub fn init_test() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
