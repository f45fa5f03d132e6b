//! Console logging for the task.
//!
//! Library crates log through the `log` facade; the subscriber installed
//! here picks those records up through the `tracing-log` bridge.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// `SYSTEM_DEBUG` as set by the agent when a run is queued with diagnostics.
pub fn debug_requested(system_debug: Option<&str>) -> bool {
    system_debug
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Install the global subscriber. `RUST_LOG` wins over `debug`.
///
/// Returns `false` if a subscriber was already installed.
pub fn init(debug: bool) -> bool {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(debug),
        )
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_debug_flag() {
        assert!(debug_requested(Some("true")));
        assert!(debug_requested(Some(" TRUE ")));
        assert!(!debug_requested(Some("false")));
        assert!(!debug_requested(Some("1")));
        assert!(!debug_requested(None));
    }
}
