//! # Logging
//!
//! Tracing subscriber setup. `RUST_LOG` wins when set, otherwise the
//! controller-wide `LOG_LEVEL` applies to this crate and kube runtime logs
//! stay at `warn`.

use crate::config::ControllerConfig;
use tracing_subscriber::EnvFilter;

/// Build the env filter from `RUST_LOG` or the configured log level
fn env_filter(config: &ControllerConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.log_level.to_lowercase();
        EnvFilter::new(format!(
            "warn,azure_keyvault_controller={level},azure_keyvault_controller::runtime={level}"
        ))
    })
}

/// Install the global tracing subscriber
///
/// Returns an error if a subscriber was already installed.
pub fn init_tracing(config: &ControllerConfig) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(config));
    let result = if config.log_format.eq_ignore_ascii_case("json") {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))
}
