//! # Azure Key Vault Controller
//!
//! A Kubernetes controller that mirrors secrets stored in Azure Key Vault into
//! Kubernetes Secrets.
//!
//! ## Overview
//!
//! This controller keeps Kubernetes Secrets in step with Azure Key Vault by:
//!
//! 1. **Watching AzureKeyVaultSecret resources** - Each one names a vault object and an output Secret
//! 2. **Creating missing Secrets** - The output Secret is created with the vault value and owned by its AzureKeyVaultSecret
//! 3. **Polling Azure Key Vault** - Every resource is re-read on a fixed interval and the Secret is rewritten when the value's MD5 hash changes
//! 4. **Recording status** - The hash and the time of the last vault write land in the resource status
//!
//! ## Features
//!
//! - **Ownership safety**: Secrets not owned by the AzureKeyVaultSecret are never overwritten
//! - **Slow-down**: Resources whose vault reads keep failing are polled less often
//! - **Multi-namespace**: Watches `AzureKeyVaultSecret` resources across all namespaces
//! - **Prometheus metrics**: Exposes metrics for monitoring and observability
//! - **Health probes**: HTTP endpoints for liveness and readiness checks
//!
//! ## Usage
//!
//! See the [README.md](../README.md) for detailed usage instructions and examples.

use anyhow::Result;
use azure_keyvault_controller::config::{parse_kubernetes_duration, ControllerConfig};
use azure_keyvault_controller::runtime::{initialization, watch_loop};
use clap::Parser;
use std::time::Duration;

/// Azure Key Vault Controller
///
/// Every flag falls back to its environment variable, then to the built-in default.
#[derive(Parser, Debug)]
#[command(name = "azure-keyvault-controller", version, about, long_about = None)]
struct Args {
    /// Workers per work queue [env: WORKERS]
    #[arg(long)]
    workers: Option<usize>,

    /// Interval between Azure Key Vault polls, e.g. "1m" [env: AZURE_POLL_FREQUENCY]
    #[arg(long, value_parser = parse_duration_arg)]
    azure_poll_frequency: Option<Duration>,

    /// Poll interval for resources that keep failing, e.g. "5m" [env: AZURE_POLL_FREQUENCY_SLOW]
    #[arg(long, value_parser = parse_duration_arg)]
    azure_poll_frequency_slow: Option<Duration>,

    /// Port for metrics and health probes [env: METRICS_PORT]
    #[arg(long)]
    metrics_port: Option<u16>,
}

impl Args {
    fn apply(self, config: &mut ControllerConfig) {
        if let Some(workers) = self.workers {
            config.workers = workers.max(1);
        }
        if let Some(frequency) = self.azure_poll_frequency {
            config.azure_poll_frequency = frequency;
        }
        if let Some(frequency) = self.azure_poll_frequency_slow {
            config.azure_poll_frequency_slow = frequency;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
    }
}

fn parse_duration_arg(value: &str) -> Result<Duration, String> {
    parse_kubernetes_duration(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = ControllerConfig::from_env();
    args.apply(&mut config);

    let init = initialization::initialize(config).await?;
    watch_loop::run_watch_loop(init).await
}
