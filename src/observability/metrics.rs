//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `azure_keyvault_controller_reconciliations_total{queue,result}` - Reconcile calls
//! - `azure_keyvault_controller_reconciliation_errors_total{queue,kind}` - Failed reconcile calls by error kind
//! - `azure_keyvault_controller_reconciliation_duration_seconds{queue}` - Reconcile call latency
//! - `azure_keyvault_controller_workqueue_dropped_total{queue}` - Items dropped after the retry ceiling
//! - `azure_keyvault_controller_workqueue_depth{queue}` - Pending items per queue
//! - `azure_keyvault_controller_secrets_created_total` - Kubernetes Secrets created
//! - `azure_keyvault_controller_secrets_updated_total` - Kubernetes Secrets updated from Azure
//! - `azure_keyvault_controller_vault_operations_total` - Azure Key Vault reads
//! - `azure_keyvault_controller_vault_operation_errors_total` - Failed Azure Key Vault reads
//! - `azure_keyvault_controller_vault_operation_duration_seconds` - Azure Key Vault read latency
//! - `azure_keyvault_controller_object_events_skipped_total{reason}` - Watched objects with no owner to enqueue

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "azure_keyvault_controller_reconciliations_total",
            "Total number of reconciliations by queue and result",
        ),
        &["queue", "result"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "azure_keyvault_controller_reconciliation_errors_total",
            "Total number of reconciliation errors by queue and error kind",
        ),
        &["queue", "kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "azure_keyvault_controller_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["queue"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static WORKQUEUE_DROPPED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "azure_keyvault_controller_workqueue_dropped_total",
            "Total number of work items dropped after exhausting retries",
        ),
        &["queue"],
    )
    .expect("Failed to create WORKQUEUE_DROPPED_TOTAL metric - this should never happen")
});

static WORKQUEUE_DEPTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "azure_keyvault_controller_workqueue_depth",
            "Current number of pending work items",
        ),
        &["queue"],
    )
    .expect("Failed to create WORKQUEUE_DEPTH metric - this should never happen")
});

static SECRETS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "azure_keyvault_controller_secrets_created_total",
        "Total number of Kubernetes Secrets created",
    )
    .expect("Failed to create SECRETS_CREATED_TOTAL metric - this should never happen")
});

static SECRETS_UPDATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "azure_keyvault_controller_secrets_updated_total",
        "Total number of Kubernetes Secrets updated with a new value from Azure Key Vault",
    )
    .expect("Failed to create SECRETS_UPDATED_TOTAL metric - this should never happen")
});

static VAULT_OPERATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "azure_keyvault_controller_vault_operations_total",
        "Total number of Azure Key Vault reads",
    )
    .expect("Failed to create VAULT_OPERATIONS_TOTAL metric - this should never happen")
});

static VAULT_OPERATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "azure_keyvault_controller_vault_operation_errors_total",
        "Total number of failed Azure Key Vault reads",
    )
    .expect("Failed to create VAULT_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static VAULT_OPERATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "azure_keyvault_controller_vault_operation_duration_seconds",
            "Duration of Azure Key Vault reads in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
    )
    .expect("Failed to create VAULT_OPERATION_DURATION metric - this should never happen")
});

static OBJECT_EVENTS_SKIPPED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "azure_keyvault_controller_object_events_skipped_total",
            "Total number of watched object events that did not map to an AzureKeyVaultSecret",
        ),
        &["reason"],
    )
    .expect("Failed to create OBJECT_EVENTS_SKIPPED_TOTAL metric - this should never happen")
});

/// Register all metrics with the registry. Call once at startup.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(WORKQUEUE_DROPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WORKQUEUE_DEPTH.clone()))?;
    REGISTRY.register(Box::new(SECRETS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_UPDATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(OBJECT_EVENTS_SKIPPED_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations(queue: &str, result: &str) {
    RECONCILIATIONS_TOTAL
        .with_label_values(&[queue, result])
        .inc();
}

pub fn increment_reconciliation_errors(queue: &str, kind: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[queue, kind])
        .inc();
}

pub fn observe_reconciliation_duration(queue: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[queue])
        .observe(duration);
}

pub fn increment_workqueue_dropped(queue: &str) {
    WORKQUEUE_DROPPED_TOTAL.with_label_values(&[queue]).inc();
}

pub fn set_workqueue_depth(queue: &str, depth: usize) {
    WORKQUEUE_DEPTH
        .with_label_values(&[queue])
        .set(i64::try_from(depth).unwrap_or(i64::MAX));
}

pub fn increment_secrets_created() {
    SECRETS_CREATED_TOTAL.inc();
}

pub fn increment_secrets_updated() {
    SECRETS_UPDATED_TOTAL.inc();
}

/// Record one Azure Key Vault read and its outcome
pub fn record_vault_operation(duration: f64, success: bool) {
    VAULT_OPERATIONS_TOTAL.inc();
    VAULT_OPERATION_DURATION.observe(duration);
    if !success {
        VAULT_OPERATION_ERRORS_TOTAL.inc();
    }
}

pub fn increment_object_events_skipped(reason: &str) {
    OBJECT_EVENTS_SKIPPED_TOTAL
        .with_label_values(&[reason])
        .inc();
}
