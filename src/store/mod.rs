//! # Stores
//!
//! Capability interfaces over the two Kubernetes object stores the reconciler
//! touches: core `Secret`s and `AzureKeyVaultSecret`s.
//!
//! Reads and writes are split into separate traits. Readers hand out shared,
//! immutable snapshots (`Arc<T>`) backed by an informer cache; writers go to
//! the authoritative API. Nothing ever mutates a snapshot returned by a reader.
//!
//! - `kubernetes`: reflector-backed readers and `Api`-backed writers
//! - `memory`: in-memory cluster with a write journal, used by tests

use crate::crd::AzureKeyVaultSecret;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use std::sync::Arc;
use thiserror::Error;

pub mod kubernetes;
pub mod memory;

pub use self::kubernetes::{KubeSecretRefStore, KubeSecretStore};
pub use self::memory::{InMemoryCluster, Operation, Write};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Conflict writing {kind} '{key}': {message}")]
    Conflict {
        kind: &'static str,
        key: String,
        message: String,
    },
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },
    #[error("Object has no {0}")]
    MissingField(&'static str),
}

/// Read-only, cached view of Kubernetes Secrets
#[async_trait]
pub trait SecretReader: Send + Sync {
    /// `Ok(None)` when the Secret does not exist
    async fn get_secret(&self, namespace: &str, name: &str)
        -> Result<Option<Arc<Secret>>, StoreError>;
}

/// Writes to the authoritative Secret store
#[async_trait]
pub trait SecretWriter: Send + Sync {
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;
    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;
}

/// Read-only, cached view of AzureKeyVaultSecret resources
#[async_trait]
pub trait SecretRefReader: Send + Sync {
    /// `Ok(None)` when the resource does not exist
    async fn get_ref(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<AzureKeyVaultSecret>>, StoreError>;

    async fn list_refs(&self) -> Result<Vec<Arc<AzureKeyVaultSecret>>, StoreError>;
}

/// Writes to the AzureKeyVaultSecret status subresource
#[async_trait]
pub trait SecretRefWriter: Send + Sync {
    /// Persist `akvs.status`. The spec is left untouched.
    async fn update_status(
        &self,
        akvs: &AzureKeyVaultSecret,
    ) -> Result<AzureKeyVaultSecret, StoreError>;
}

/// `namespace/name` for log and error messages
pub(crate) fn object_key(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}/{name}")
    }
}
