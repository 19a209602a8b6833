//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::duration::parse_kubernetes_duration;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How often every AzureKeyVaultSecret is checked against Azure Key Vault
    pub azure_poll_frequency: Duration,
    /// Poll interval used for resources that keep failing
    pub azure_poll_frequency_slow: Duration,
    /// Consecutive poll failures before a resource moves to the slow interval
    pub max_failures_before_slowing_down: u32,
    /// Workers draining each of the two work queues
    pub workers: usize,
    /// Retries per work item before it is dropped
    pub max_retries: u32,
    /// Exponential backoff starting value (milliseconds)
    pub backoff_start_ms: u64,
    /// Exponential backoff maximum value (milliseconds)
    pub backoff_max_ms: u64,
    /// Delay before a watch stream is restarted after it ends (seconds)
    pub watch_restart_delay_secs: u64,
    /// HTTP port for metrics and probes
    pub metrics_port: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Client ID for Azure Workload Identity. Managed Identity is used when unset.
    pub azure_client_id: Option<String>,
    /// Problems found while reading the environment, logged once tracing is up
    pub load_warnings: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            azure_poll_frequency: Duration::from_secs(60),
            azure_poll_frequency_slow: Duration::from_secs(300),
            max_failures_before_slowing_down: DEFAULT_MAX_FAILURES_BEFORE_SLOWING_DOWN,
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
            azure_client_id: None,
            load_warnings: Vec::new(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// Invalid durations fall back to their default and are noted in
    /// `load_warnings`, since tracing is not set up yet at this point.
    pub fn from_env() -> Self {
        use crate::constants::*;
        let mut load_warnings = Vec::new();
        Self {
            azure_poll_frequency: env_duration_or_default(
                "AZURE_POLL_FREQUENCY",
                DEFAULT_AZURE_POLL_FREQUENCY,
                &mut load_warnings,
            ),
            azure_poll_frequency_slow: env_duration_or_default(
                "AZURE_POLL_FREQUENCY_SLOW",
                DEFAULT_AZURE_POLL_FREQUENCY_SLOW,
                &mut load_warnings,
            ),
            max_failures_before_slowing_down: env_var_or_default(
                "MAX_FAILURES_BEFORE_SLOWING_DOWN",
                DEFAULT_MAX_FAILURES_BEFORE_SLOWING_DOWN,
            ),
            workers: env_var_or_default("WORKERS", DEFAULT_WORKERS).max(1),
            max_retries: env_var_or_default("MAX_RETRIES", DEFAULT_MAX_RETRIES),
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
            azure_client_id: std::env::var("AZURE_CLIENT_ID")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            load_warnings,
        }
    }

    /// Get backoff start duration
    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    /// Get backoff max duration
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a Kubernetes duration from the environment, falling back to `default` when unset or invalid
fn env_duration_or_default(key: &str, default: &str, warnings: &mut Vec<String>) -> Duration {
    let raw = env_var_or_default_str(key, default);
    parse_kubernetes_duration(&raw).unwrap_or_else(|e| {
        warnings.push(format!("Invalid {key} '{raw}': {e}, using default '{default}'"));
        parse_kubernetes_duration(default).unwrap_or(Duration::from_secs(60))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_duration_is_kept_as_warning() {
        std::env::set_var("TEST_AKV_INVALID_POLL_FREQUENCY", "soon");
        let mut warnings = Vec::new();

        let frequency =
            env_duration_or_default("TEST_AKV_INVALID_POLL_FREQUENCY", "1m", &mut warnings);

        assert_eq!(frequency, Duration::from_secs(60));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("TEST_AKV_INVALID_POLL_FREQUENCY 'soon'"));
        std::env::remove_var("TEST_AKV_INVALID_POLL_FREQUENCY");
    }

    #[test]
    fn test_unset_duration_uses_default_silently() {
        let mut warnings = Vec::new();

        let frequency =
            env_duration_or_default("TEST_AKV_UNSET_POLL_FREQUENCY", "5m", &mut warnings);

        assert_eq!(frequency, Duration::from_secs(300));
        assert!(warnings.is_empty());
    }
}
