//! # In-Memory Stores
//!
//! A single in-memory "cluster" implementing every store trait. Writes behave
//! like the API server for the parts the reconciler relies on: `stringData` is
//! folded into `data`, `resourceVersion` is bumped on every write and checked
//! on update, and status writes never touch the spec.
//!
//! Every successful write is appended to a journal so tests can assert exactly
//! which writes happened and in which order. Failures can be injected per
//! operation.

use super::{
    object_key, SecretReader, SecretRefReader, SecretRefWriter, SecretWriter, StoreError,
};
use crate::crd::AzureKeyVaultSecret;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type ObjectKey = (String, String);

/// A successful write recorded by [`InMemoryCluster`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    CreateSecret { key: String },
    UpdateSecret { key: String },
    UpdateStatus { key: String, secret_hash: Option<String> },
}

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetSecret,
    CreateSecret,
    UpdateSecret,
    GetRef,
    ListRefs,
    UpdateStatus,
}

#[derive(Debug, Default)]
struct State {
    secrets: BTreeMap<ObjectKey, Arc<Secret>>,
    refs: BTreeMap<ObjectKey, Arc<AzureKeyVaultSecret>>,
    journal: Vec<Write>,
    failures: HashMap<Operation, u32>,
}

/// In-memory Secret and AzureKeyVaultSecret stores
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
    resource_version: AtomicU64,
    uid: AtomicU64,
}

fn key_of(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

fn meta_key(
    namespace: Option<&String>,
    name: Option<&String>,
) -> Result<ObjectKey, StoreError> {
    let namespace = namespace.ok_or(StoreError::MissingField("metadata.namespace"))?;
    let name = name.ok_or(StoreError::MissingField("metadata.name"))?;
    Ok((namespace.clone(), name.clone()))
}

/// Move `stringData` into base64-free `data`, as the API server does on write
fn fold_string_data(secret: &mut Secret) {
    if let Some(string_data) = secret.string_data.take() {
        let data = secret.data.get_or_insert_with(BTreeMap::new);
        for (k, v) in string_data {
            data.insert(k, ByteString(v.into_bytes()));
        }
    }
}

impl InMemoryCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("in-memory store poisoned: {e}")))
    }

    fn next_resource_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    fn next_uid(&self) -> String {
        format!("uid-{}", self.uid.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Fail the next `times` calls of `operation` with [`StoreError::Unavailable`]
    pub fn fail_next(&self, operation: Operation, times: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.insert(operation, times);
        }
    }

    fn check_failure(state: &mut State, operation: Operation) -> Result<(), StoreError> {
        if let Some(remaining) = state.failures.get_mut(&operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Unavailable(format!(
                    "injected failure for {operation:?}"
                )));
            }
        }
        Ok(())
    }

    /// Add or replace an AzureKeyVaultSecret, assigning a uid when it has none
    pub fn insert_ref(&self, mut akvs: AzureKeyVaultSecret) -> Arc<AzureKeyVaultSecret> {
        if akvs.metadata.uid.is_none() {
            akvs.metadata.uid = Some(self.next_uid());
        }
        akvs.metadata.resource_version = Some(self.next_resource_version());
        let key = key_of(
            akvs.metadata.namespace.as_deref().unwrap_or_default(),
            akvs.metadata.name.as_deref().unwrap_or_default(),
        );
        let akvs = Arc::new(akvs);
        if let Ok(mut state) = self.state.lock() {
            state.refs.insert(key, Arc::clone(&akvs));
        }
        akvs
    }

    /// Delete an AzureKeyVaultSecret. Owned Secrets are left alone, as garbage
    /// collection is not emulated.
    pub fn remove_ref(&self, namespace: &str, name: &str) -> Option<Arc<AzureKeyVaultSecret>> {
        self.state
            .lock()
            .ok()
            .and_then(|mut state| state.refs.remove(&key_of(namespace, name)))
    }

    /// Add or replace a Secret without journaling it
    pub fn insert_secret(&self, mut secret: Secret) -> Arc<Secret> {
        fold_string_data(&mut secret);
        secret.metadata.resource_version = Some(self.next_resource_version());
        let key = key_of(
            secret.metadata.namespace.as_deref().unwrap_or_default(),
            secret.metadata.name.as_deref().unwrap_or_default(),
        );
        let secret = Arc::new(secret);
        if let Ok(mut state) = self.state.lock() {
            state.secrets.insert(key, Arc::clone(&secret));
        }
        secret
    }

    /// Delete a Secret without journaling it
    pub fn remove_secret(&self, namespace: &str, name: &str) -> Option<Arc<Secret>> {
        self.state
            .lock()
            .ok()
            .and_then(|mut state| state.secrets.remove(&key_of(namespace, name)))
    }

    /// Current Secret snapshot
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Arc<Secret>> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.secrets.get(&key_of(namespace, name)).cloned())
    }

    /// Current AzureKeyVaultSecret snapshot
    pub fn secret_ref(&self, namespace: &str, name: &str) -> Option<Arc<AzureKeyVaultSecret>> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.refs.get(&key_of(namespace, name)).cloned())
    }

    /// UTF-8 value stored under `key` in a Secret's data
    pub fn secret_value(&self, namespace: &str, name: &str, key: &str) -> Option<String> {
        let secret = self.secret(namespace, name)?;
        let bytes = secret.data.as_ref()?.get(key)?;
        String::from_utf8(bytes.0.clone()).ok()
    }

    /// Journal of successful writes, oldest first
    pub fn writes(&self) -> Vec<Write> {
        self.state
            .lock()
            .map(|state| state.journal.clone())
            .unwrap_or_default()
    }

    /// Empty the write journal
    pub fn clear_writes(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.journal.clear();
        }
    }
}

#[async_trait]
impl SecretReader for InMemoryCluster {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<Secret>>, StoreError> {
        let mut state = self.lock()?;
        Self::check_failure(&mut state, Operation::GetSecret)?;
        Ok(state.secrets.get(&key_of(namespace, name)).cloned())
    }
}

#[async_trait]
impl SecretWriter for InMemoryCluster {
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let key = meta_key(
            secret.metadata.namespace.as_ref(),
            secret.metadata.name.as_ref(),
        )?;
        let mut state = self.lock()?;
        Self::check_failure(&mut state, Operation::CreateSecret)?;

        let display = object_key(&key.0, &key.1);
        if state.secrets.contains_key(&key) {
            return Err(StoreError::Conflict {
                kind: "Secret",
                key: display,
                message: "already exists".to_string(),
            });
        }

        let mut created = secret.clone();
        fold_string_data(&mut created);
        created.metadata.resource_version = Some(self.next_resource_version());
        created.metadata.uid = Some(self.next_uid());
        state.secrets.insert(key, Arc::new(created.clone()));
        state.journal.push(Write::CreateSecret { key: display });
        Ok(created)
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let key = meta_key(
            secret.metadata.namespace.as_ref(),
            secret.metadata.name.as_ref(),
        )?;
        let mut state = self.lock()?;
        Self::check_failure(&mut state, Operation::UpdateSecret)?;

        let display = object_key(&key.0, &key.1);
        let Some(existing) = state.secrets.get(&key) else {
            return Err(StoreError::NotFound {
                kind: "Secret",
                key: display,
            });
        };
        if let Some(expected) = secret.metadata.resource_version.as_deref() {
            if existing.metadata.resource_version.as_deref() != Some(expected) {
                return Err(StoreError::Conflict {
                    kind: "Secret",
                    key: display,
                    message: "the object has been modified".to_string(),
                });
            }
        }

        let mut updated = secret.clone();
        updated.data = None;
        fold_string_data(&mut updated);
        updated.metadata.uid.clone_from(&existing.metadata.uid);
        updated.metadata.resource_version = Some(self.next_resource_version());
        state.secrets.insert(key, Arc::new(updated.clone()));
        state.journal.push(Write::UpdateSecret { key: display });
        Ok(updated)
    }
}

#[async_trait]
impl SecretRefReader for InMemoryCluster {
    async fn get_ref(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Arc<AzureKeyVaultSecret>>, StoreError> {
        let mut state = self.lock()?;
        Self::check_failure(&mut state, Operation::GetRef)?;
        Ok(state.refs.get(&key_of(namespace, name)).cloned())
    }

    async fn list_refs(&self) -> Result<Vec<Arc<AzureKeyVaultSecret>>, StoreError> {
        let mut state = self.lock()?;
        Self::check_failure(&mut state, Operation::ListRefs)?;
        Ok(state.refs.values().cloned().collect())
    }
}

#[async_trait]
impl SecretRefWriter for InMemoryCluster {
    async fn update_status(
        &self,
        akvs: &AzureKeyVaultSecret,
    ) -> Result<AzureKeyVaultSecret, StoreError> {
        let key = meta_key(akvs.metadata.namespace.as_ref(), akvs.metadata.name.as_ref())?;
        let mut state = self.lock()?;
        Self::check_failure(&mut state, Operation::UpdateStatus)?;

        let display = object_key(&key.0, &key.1);
        let Some(existing) = state.refs.get(&key) else {
            return Err(StoreError::NotFound {
                kind: "AzureKeyVaultSecret",
                key: display,
            });
        };

        // Status subresource: keep the stored spec and metadata, take only status
        let mut updated = AzureKeyVaultSecret::clone(existing);
        updated.status.clone_from(&akvs.status);
        updated.metadata.resource_version = Some(self.next_resource_version());
        state.refs.insert(key, Arc::new(updated.clone()));
        state.journal.push(Write::UpdateStatus {
            key: display,
            secret_hash: updated.status.as_ref().and_then(|s| s.secret_hash.clone()),
        });
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn secret(name: &str, value: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..ObjectMeta::default()
            },
            string_data: Some(BTreeMap::from([("password".to_string(), value.to_string())])),
            ..Secret::default()
        }
    }

    #[tokio::test]
    async fn test_create_folds_string_data_and_journals() {
        let cluster = InMemoryCluster::new();
        let created = cluster.create_secret(&secret("db-secret", "hunter2")).await.unwrap();

        assert!(created.string_data.is_none());
        assert_eq!(
            cluster.secret_value("default", "db-secret", "password").as_deref(),
            Some("hunter2")
        );
        assert_eq!(
            cluster.writes(),
            vec![Write::CreateSecret {
                key: "default/db-secret".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_create_existing_is_conflict() {
        let cluster = InMemoryCluster::new();
        cluster.insert_secret(secret("db-secret", "a"));

        let err = cluster.create_secret(&secret("db-secret", "b")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert!(cluster.writes().is_empty());
    }

    #[tokio::test]
    async fn test_update_checks_resource_version() {
        let cluster = InMemoryCluster::new();
        let stored = cluster.insert_secret(secret("db-secret", "a"));

        let mut stale = secret("db-secret", "b");
        stale.metadata.resource_version = Some("999".to_string());
        let err = cluster.update_secret(&stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let mut fresh = secret("db-secret", "b");
        fresh.metadata.resource_version.clone_from(&stored.metadata.resource_version);
        cluster.update_secret(&fresh).await.unwrap();
        assert_eq!(
            cluster.secret_value("default", "db-secret", "password").as_deref(),
            Some("b")
        );
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed() {
        let cluster = InMemoryCluster::new();
        cluster.fail_next(Operation::GetSecret, 1);

        assert!(cluster.get_secret("default", "x").await.is_err());
        assert!(cluster.get_secret("default", "x").await.unwrap().is_none());
    }
}
