//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Name reported as the event source and used as the field manager
pub const CONTROLLER_NAME: &str = "azure-keyvault-controller";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default interval between Azure Key Vault polls
pub const DEFAULT_AZURE_POLL_FREQUENCY: &str = "1m";

/// Default interval between polls once a resource keeps failing
pub const DEFAULT_AZURE_POLL_FREQUENCY_SLOW: &str = "5m";

/// Consecutive vault failures before a resource is polled at the slow interval
pub const DEFAULT_MAX_FAILURES_BEFORE_SLOWING_DOWN: u32 = 5;

/// Default number of workers draining each work queue
pub const DEFAULT_WORKERS: usize = 2;

/// Default retry ceiling before a work item is dropped
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default exponential backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 5;

/// Default exponential backoff maximum value (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 1_000_000;

/// Default delay before restarting a watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;
