//! # Types
//!
//! Core types for the reconciler.

use crate::controller::events::EventRecorder;
use crate::provider::VaultReader;
use crate::store::{SecretReader, SecretRefReader, SecretRefWriter, SecretWriter, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Invalid resource key: {0}")]
    InvalidKey(String),
    #[error("{0}: secret name must be specified")]
    MissingOutputName(String),
    #[error("AzureKeyVaultSecret '{0}' has no uid and cannot own a Secret")]
    MissingOwnerIdentity(String),
    #[error("Resource \"{secret}\" already exists and is not managed by AzureKeyVaultSecret '{resource}'")]
    ResourceConflict { resource: String, secret: String },
    #[error("Failed to get secret for '{resource}' from Azure Key Vault '{vault}': {source}")]
    VaultFetch {
        resource: String,
        vault: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Secret '{secret}' for AzureKeyVaultSecret '{resource}' does not exist yet")]
    MaterializedSecretMissing { resource: String, secret: String },
    #[error("Failed to decode object: {0}")]
    Decode(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcilerError {
    /// Stable label for metrics and logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::InvalidKey(_) => "invalid_key",
            ReconcilerError::MissingOutputName(_) => "missing_output_name",
            ReconcilerError::MissingOwnerIdentity(_) => "missing_owner_identity",
            ReconcilerError::ResourceConflict { .. } => "resource_conflict",
            ReconcilerError::VaultFetch { .. } => "vault_fetch",
            ReconcilerError::MaterializedSecretMissing { .. } => "materialized_secret_missing",
            ReconcilerError::Decode(_) => "decode",
            ReconcilerError::Store(_) => "store",
        }
    }

    /// Whether re-delivering the same work item can succeed. Malformed keys
    /// and undecodable objects never converge and are dropped.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ReconcilerError::InvalidKey(_) | ReconcilerError::Decode(_)
        )
    }
}

/// Reconciliation handler shared by every worker of both queues
///
/// Holds read-only views of the caches, the authoritative writers, the vault
/// and the event sink. Cheap to share behind an `Arc`.
#[derive(Clone)]
pub struct Handler {
    pub(crate) secrets: Arc<dyn SecretReader>,
    pub(crate) secret_writer: Arc<dyn SecretWriter>,
    pub(crate) refs: Arc<dyn SecretRefReader>,
    pub(crate) ref_writer: Arc<dyn SecretRefWriter>,
    pub(crate) vault: Arc<dyn VaultReader>,
    pub(crate) recorder: Arc<dyn EventRecorder>,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").finish_non_exhaustive()
    }
}

impl Handler {
    pub fn new(
        secrets: Arc<dyn SecretReader>,
        secret_writer: Arc<dyn SecretWriter>,
        refs: Arc<dyn SecretRefReader>,
        ref_writer: Arc<dyn SecretRefWriter>,
        vault: Arc<dyn VaultReader>,
        recorder: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            secrets,
            secret_writer,
            refs,
            ref_writer,
            vault,
            recorder,
        }
    }

    /// Handler whose stores are all backed by one object implementing every
    /// store trait, such as [`crate::store::InMemoryCluster`]
    pub fn with_cluster<C>(
        cluster: &Arc<C>,
        vault: Arc<dyn VaultReader>,
        recorder: Arc<dyn EventRecorder>,
    ) -> Self
    where
        C: SecretReader + SecretWriter + SecretRefReader + SecretRefWriter + 'static,
    {
        Self::new(
            Arc::clone(cluster) as Arc<dyn SecretReader>,
            Arc::clone(cluster) as Arc<dyn SecretWriter>,
            Arc::clone(cluster) as Arc<dyn SecretRefReader>,
            Arc::clone(cluster) as Arc<dyn SecretRefWriter>,
            vault,
            recorder,
        )
    }
}
