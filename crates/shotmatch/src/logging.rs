//! Log output.
//!
//! Baseline writes are logged at `info`, weak errors at `error` and matcher
//! state transitions at `debug`. Hosts with their own subscriber need nothing
//! from here; everyone else can call [`init_logging`].

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "SHOTMATCH_LOG";

const DEFAULT_FILTER: &str = "info";

/// Filter from `SHOTMATCH_LOG`, falling back to `info`
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a formatting subscriber.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_logging() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .try_init()
        .is_ok()
}
