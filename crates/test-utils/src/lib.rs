pub mod builders;
pub mod fake_backend;
pub mod fake_status;

use stagehand::logging::LOG_ENV_VAR;
use tracing_subscriber::{fmt, EnvFilter};

/// Route `tracing` output through the test harness. Safe to call from every
/// test; only the first call installs a subscriber.
///
/// Quiet (`warn`) unless `STAGEHAND_LOG` carries filter directives.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_tracing();
        init_tracing();
        tracing::warn!(stage = "s", "still logging");
    }
}
