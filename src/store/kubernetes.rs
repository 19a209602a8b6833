//! # Kubernetes Stores
//!
//! Readers are backed by reflector caches kept up to date by the watch loop.
//! Writers call the API server directly.

use super::{
    object_key, SecretReader, SecretRefReader, SecretRefWriter, SecretWriter, StoreError,
};
use crate::constants::CONTROLLER_NAME;
use crate::crd::AzureKeyVaultSecret;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::Client;
use std::sync::Arc;

/// Secrets: reflector cache for reads, `Api<Secret>` for writes
#[derive(Clone)]
pub struct KubeSecretStore {
    cache: Store<Secret>,
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    pub fn new(cache: Store<Secret>, client: Client) -> Self {
        Self { cache, client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn namespace_of(secret: &Secret) -> Result<&str, StoreError> {
    secret
        .metadata
        .namespace
        .as_deref()
        .ok_or(StoreError::MissingField("metadata.namespace"))
}

fn name_of(secret: &Secret) -> Result<&str, StoreError> {
    secret
        .metadata
        .name
        .as_deref()
        .ok_or(StoreError::MissingField("metadata.name"))
}

#[async_trait]
impl SecretReader for KubeSecretStore {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<Secret>>, StoreError> {
        Ok(self.cache.get(&ObjectRef::new(name).within(namespace)))
    }
}

#[async_trait]
impl SecretWriter for KubeSecretStore {
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let namespace = namespace_of(secret)?;
        Ok(self
            .api(namespace)
            .create(&PostParams::default(), secret)
            .await?)
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let namespace = namespace_of(secret)?;
        let name = name_of(secret)?;
        match self
            .api(namespace)
            .replace(name, &PostParams::default(), secret)
            .await
        {
            Ok(updated) => Ok(updated),
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => Err(StoreError::Conflict {
                kind: "Secret",
                key: object_key(namespace, name),
                message: api_err.message,
            }),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Err(StoreError::NotFound {
                kind: "Secret",
                key: object_key(namespace, name),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// AzureKeyVaultSecrets: reflector cache for reads, status subresource for writes
#[derive(Clone)]
pub struct KubeSecretRefStore {
    cache: Store<AzureKeyVaultSecret>,
    client: Client,
}

impl std::fmt::Debug for KubeSecretRefStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretRefStore").finish_non_exhaustive()
    }
}

impl KubeSecretRefStore {
    pub fn new(cache: Store<AzureKeyVaultSecret>, client: Client) -> Self {
        Self { cache, client }
    }
}

#[async_trait]
impl SecretRefReader for KubeSecretRefStore {
    async fn get_ref(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<AzureKeyVaultSecret>>, StoreError> {
        Ok(self.cache.get(&ObjectRef::new(name).within(namespace)))
    }

    async fn list_refs(&self) -> Result<Vec<Arc<AzureKeyVaultSecret>>, StoreError> {
        Ok(self.cache.state())
    }
}

#[async_trait]
impl SecretRefWriter for KubeSecretRefStore {
    async fn update_status(
        &self,
        akvs: &AzureKeyVaultSecret,
    ) -> Result<AzureKeyVaultSecret, StoreError> {
        let namespace = akvs
            .metadata
            .namespace
            .as_deref()
            .ok_or(StoreError::MissingField("metadata.namespace"))?;
        let name = akvs
            .metadata
            .name
            .as_deref()
            .ok_or(StoreError::MissingField("metadata.name"))?;

        let patch = serde_json::json!({
            "status": akvs.status
        });

        let api: Api<AzureKeyVaultSecret> = Api::namespaced(self.client.clone(), namespace);
        match api
            .patch_status(name, &PatchParams::apply(CONTROLLER_NAME), &Patch::Merge(patch))
            .await
        {
            Ok(updated) => Ok(updated),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Err(StoreError::NotFound {
                kind: "AzureKeyVaultSecret",
                key: object_key(namespace, name),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
