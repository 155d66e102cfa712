pub mod metrics;

use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Install the global tracing subscriber from the configured log level.
/// Call once at app startup; later calls are ignored.
pub fn init_tracing(config: &Config) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .try_init();
}
