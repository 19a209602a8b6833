//! Common test utilities for the reconcile integration tests
//!
//! Builds a handler over the in-memory cluster, vault and event recorder, plus
//! the `default/db-cred` AzureKeyVaultSecret used throughout.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use azure_keyvault_controller::controller::events::{EventRecorder, MemoryEventRecorder};
use azure_keyvault_controller::controller::reconciler::Handler;
use azure_keyvault_controller::crd::{
    AzureKeyVault, AzureKeyVaultObject, AzureKeyVaultObjectType, AzureKeyVaultSecret,
    AzureKeyVaultSecretSpec, OutputSecret,
};
use azure_keyvault_controller::provider::{InMemoryVault, VaultReader};
use azure_keyvault_controller::store::{
    InMemoryCluster, SecretReader, SecretRefReader, SecretRefWriter, SecretWriter,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use std::sync::Arc;

pub const VAULT: &str = "kv1";
pub const OBJECT: &str = "db-pass";
pub const OUTPUT: &str = "db-secret";
pub const KEY_NAME: &str = "password";

pub struct Harness {
    pub cluster: Arc<InMemoryCluster>,
    pub vault: Arc<InMemoryVault>,
    pub recorder: Arc<MemoryEventRecorder>,
    pub handler: Handler,
}

impl Harness {
    pub fn new() -> Self {
        let cluster = Arc::new(InMemoryCluster::new());
        let vault = Arc::new(InMemoryVault::new());
        let recorder = Arc::new(MemoryEventRecorder::default());
        let handler = Handler::with_cluster(
            &cluster,
            Arc::clone(&vault) as Arc<dyn VaultReader>,
            Arc::clone(&recorder) as Arc<dyn EventRecorder>,
        );
        Self {
            cluster,
            vault,
            recorder,
            handler,
        }
    }

    /// Handler reading Secrets from `cache` instead of the cluster, as when
    /// the informer cache lags behind the API server
    pub fn handler_with_secret_cache(&self, cache: Arc<dyn SecretReader>) -> Handler {
        Handler::new(
            cache,
            Arc::clone(&self.cluster) as Arc<dyn SecretWriter>,
            Arc::clone(&self.cluster) as Arc<dyn SecretRefReader>,
            Arc::clone(&self.cluster) as Arc<dyn SecretRefWriter>,
            Arc::clone(&self.vault) as Arc<dyn VaultReader>,
            Arc::clone(&self.recorder) as Arc<dyn EventRecorder>,
        )
    }

    /// Store `value` under `kv1/db-pass`
    pub fn set_vault_value(&self, value: &str) {
        self.vault.set_value(VAULT, OBJECT, value);
    }

    /// Current `password` value of `default/db-secret`
    pub fn output_value(&self) -> Option<String> {
        self.cluster.secret_value("default", OUTPUT, KEY_NAME)
    }

    /// Status hash currently stored on `default/<name>`
    pub fn status_hash(&self, name: &str) -> Option<String> {
        self.cluster
            .secret_ref("default", name)
            .map(|akvs| akvs.observed_hash().to_string())
            .filter(|hash| !hash.is_empty())
    }
}

/// AzureKeyVaultSecret reading `kv1/db-pass` into `<output>.password`
pub fn akvs(namespace: &str, name: &str, output: &str) -> AzureKeyVaultSecret {
    let mut resource = AzureKeyVaultSecret::new(
        name,
        AzureKeyVaultSecretSpec {
            vault: AzureKeyVault {
                name: VAULT.to_string(),
                object: AzureKeyVaultObject {
                    name: OBJECT.to_string(),
                    object_type: AzureKeyVaultObjectType::Secret,
                },
            },
            output_secret: OutputSecret {
                name: output.to_string(),
                key_name: KEY_NAME.to_string(),
                secret_type: "Opaque".to_string(),
            },
        },
    );
    resource.metadata.namespace = Some(namespace.to_string());
    resource.metadata.uid = Some(format!("uid-{namespace}-{name}"));
    resource
}

/// Secret named `name` in the owner's namespace, controlled by `owner`
pub fn secret_owned_by(owner: &AzureKeyVaultSecret, name: &str, value: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: owner.metadata.namespace.clone(),
            owner_references: owner.controller_owner_ref(&()).map(|r| vec![r]),
            ..ObjectMeta::default()
        },
        string_data: Some([(KEY_NAME.to_string(), value.to_string())].into()),
        ..Secret::default()
    }
}
