//! # Events
//!
//! Kubernetes Event recording for AzureKeyVaultSecret resources.
//!
//! Events are **fire-and-forget**: failures are logged as warnings and never
//! propagate. A failed event must never break reconciliation.

use crate::crd::AzureKeyVaultSecret;
use async_trait::async_trait;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use std::sync::Mutex;
use tracing::warn;

/// Event reasons, shown in the REASON column of `kubectl get events`
pub mod reasons {
    /// Secret is in sync with its AzureKeyVaultSecret
    pub const SUCCESS_SYNCED: &str = "Synced";
    /// A Secret with the output name exists but is owned by something else
    pub const ERR_RESOURCE_EXISTS: &str = "ErrResourceExists";
    /// Azure Key Vault could not be read
    pub const ERR_AZURE_VAULT: &str = "ErrAzureVault";
}

/// Event messages
pub mod messages {
    /// Spec sync finished
    pub const RESOURCE_SYNCED: &str = "AzureKeyVaultSecret synced successfully";
    /// Vault poll wrote a new value
    pub const RESOURCE_SYNCED_WITH_AZURE: &str = "AzureKeyVaultSecret synced to Kubernetes Secret with value from Azure Key Vault. Resources using this Secret must be restarted to pick up the new value";

    /// Secret exists and is not controlled by the AzureKeyVaultSecret
    #[must_use]
    pub fn resource_exists(secret_name: &str) -> String {
        format!("Resource \"{secret_name}\" already exists and is not managed by AzureKeyVaultSecret")
    }

    /// Vault fetch failed
    #[must_use]
    pub fn failed_azure_key_vault(resource_name: &str, vault_name: &str) -> String {
        format!("Failed to get secret for '{resource_name}' from Azure Key Vault '{vault_name}'")
    }
}

/// Sink for notifications about an AzureKeyVaultSecret
#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Record an event on `subject`. Never fails.
    async fn record(
        &self,
        subject: &AzureKeyVaultSecret,
        type_: EventType,
        reason: &str,
        message: String,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventRecorder").finish_non_exhaustive()
    }
}

impl KubeEventRecorder {
    /// Create a recorder reporting as `controller_name`
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(
        &self,
        subject: &AzureKeyVaultSecret,
        type_: EventType,
        reason: &str,
        message: String,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(message),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, &subject.object_ref(&())).await {
            warn!(
                resource = subject.key().as_str(),
                reason,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// An event captured by [`MemoryEventRecorder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// `namespace/name` of the subject
    pub subject: String,
    /// "Normal" or "Warning"
    pub type_: String,
    pub reason: String,
    pub message: String,
}

/// Records events in memory. Used by tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryEventRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemoryEventRecorder {
    /// All events recorded so far, oldest first
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Reasons of all events recorded so far
    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[async_trait]
impl EventRecorder for MemoryEventRecorder {
    async fn record(
        &self,
        subject: &AzureKeyVaultSecret,
        type_: EventType,
        reason: &str,
        message: String,
    ) {
        let type_ = match type_ {
            EventType::Normal => "Normal",
            EventType::Warning => "Warning",
        };
        if let Ok(mut events) = self.events.lock() {
            events.push(RecordedEvent {
                subject: subject.key(),
                type_: type_.to_string(),
                reason: reason.to_string(),
                message,
            });
        }
    }
}
