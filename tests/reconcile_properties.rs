//! Properties every reconcile pass must hold, checked against the in-memory
//! cluster and vault.

mod common;

use azure_keyvault_controller::controller::reconciler::{
    content_hash, ObjectEvent, ReconcilerError,
};
use azure_keyvault_controller::store::{Operation, SecretReader, StoreError, Write};
use async_trait::async_trait;
use common::{akvs, secret_owned_by, Harness, OUTPUT};
use k8s_openapi::api::core::v1::Secret;
use std::sync::Arc;

/// Secret cache stuck on one snapshot while the cluster moves on
struct FrozenSecretCache(Option<Arc<Secret>>);

#[async_trait]
impl SecretReader for FrozenSecretCache {
    async fn get_secret(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<Option<Arc<Secret>>, StoreError> {
        Ok(self.0.clone())
    }
}

fn status_write(name: &str, value: &str) -> Write {
    Write::UpdateStatus {
        key: format!("default/{name}"),
        secret_hash: Some(content_hash(value)),
    }
}

#[tokio::test]
async fn spec_sync_twice_writes_once() {
    let h = Harness::new();
    h.set_vault_value("hunter2");
    h.cluster.insert_ref(akvs("default", "db-cred", OUTPUT));

    h.handler.sync_handler("default/db-cred").await.unwrap();
    let first = h.cluster.writes();
    h.handler.sync_handler("default/db-cred").await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(h.cluster.writes(), first);
}

#[tokio::test]
async fn vault_poll_with_same_hash_writes_nothing() {
    let h = Harness::new();
    h.set_vault_value("old");
    h.cluster.insert_ref(akvs("default", "db-cred", OUTPUT));
    h.handler.sync_handler("default/db-cred").await.unwrap();
    h.cluster.clear_writes();

    h.handler.azure_sync_handler("default/db-cred").await.unwrap();

    assert!(h.cluster.writes().is_empty());
    assert_eq!(h.vault.reads(), 2);
}

#[tokio::test]
async fn vault_poll_with_new_hash_updates_secret_then_status() {
    let h = Harness::new();
    h.set_vault_value("old");
    h.cluster.insert_ref(akvs("default", "db-cred", OUTPUT));
    h.handler.sync_handler("default/db-cred").await.unwrap();
    h.cluster.clear_writes();

    h.set_vault_value("new");
    h.handler.azure_sync_handler("default/db-cred").await.unwrap();

    assert_eq!(
        h.cluster.writes(),
        vec![
            Write::UpdateSecret {
                key: "default/db-secret".to_string()
            },
            status_write("db-cred", "new"),
        ]
    );
}

#[tokio::test]
async fn secret_owned_by_another_resource_is_never_touched() {
    let h = Harness::new();
    h.set_vault_value("mine");
    let other = h.cluster.insert_ref(akvs("default", "other", OUTPUT));
    h.cluster.insert_secret(secret_owned_by(&other, OUTPUT, "theirs"));
    h.cluster.insert_ref(akvs("default", "db-cred", OUTPUT));

    let spec_err = h.handler.sync_handler("default/db-cred").await.unwrap_err();
    let poll_err = h
        .handler
        .azure_sync_handler("default/db-cred")
        .await
        .unwrap_err();

    assert!(matches!(spec_err, ReconcilerError::ResourceConflict { .. }));
    assert!(matches!(poll_err, ReconcilerError::ResourceConflict { .. }));
    assert!(h.cluster.writes().is_empty());
    assert_eq!(h.output_value().as_deref(), Some("theirs"));
    assert_eq!(
        h.recorder.reasons(),
        vec!["ErrResourceExists".to_string(), "ErrResourceExists".to_string()]
    );
}

#[tokio::test]
async fn object_with_missing_owner_is_skipped() {
    let h = Harness::new();
    let gone = akvs("default", "gone", OUTPUT);
    let secret = secret_owned_by(&gone, OUTPUT, "stale");

    let live = h
        .handler
        .handle_object(&ObjectEvent::Live(Arc::new(secret.clone())))
        .await
        .unwrap();
    let deleted = h
        .handler
        .handle_object(&ObjectEvent::Tombstone {
            key: "default/db-secret".to_string(),
            object: Some(Arc::new(secret)),
        })
        .await
        .unwrap();

    assert!(live.is_none());
    assert!(deleted.is_none());
}

#[tokio::test]
async fn object_without_controller_is_skipped() {
    let h = Harness::new();
    h.cluster.insert_ref(akvs("default", "db-cred", OUTPUT));
    let mut secret = secret_owned_by(&akvs("default", "db-cred", OUTPUT), OUTPUT, "v");
    secret.metadata.owner_references = None;

    let resolved = h
        .handler
        .handle_object(&ObjectEvent::Live(Arc::new(secret)))
        .await
        .unwrap();

    assert!(resolved.is_none());
}

#[tokio::test]
async fn failed_status_write_is_repaired_by_next_poll() {
    let h = Harness::new();
    h.set_vault_value("old");
    h.cluster.insert_ref(akvs("default", "db-cred", OUTPUT));
    h.handler.sync_handler("default/db-cred").await.unwrap();
    h.cluster.clear_writes();

    h.set_vault_value("new");
    h.cluster.fail_next(Operation::UpdateStatus, 1);
    let err = h
        .handler
        .azure_sync_handler("default/db-cred")
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(h.output_value().as_deref(), Some("new"));
    assert_eq!(h.status_hash("db-cred"), Some(content_hash("old")));

    h.cluster.clear_writes();
    h.handler.azure_sync_handler("default/db-cred").await.unwrap();

    assert_eq!(
        h.cluster.writes(),
        vec![
            Write::UpdateSecret {
                key: "default/db-secret".to_string()
            },
            status_write("db-cred", "new"),
        ]
    );
    assert_eq!(h.output_value().as_deref(), Some("new"));
}

#[tokio::test]
async fn cached_objects_are_not_mutated_by_reconcile() {
    let h = Harness::new();
    h.set_vault_value("old");
    h.cluster.insert_ref(akvs("default", "db-cred", OUTPUT));
    h.handler.sync_handler("default/db-cred").await.unwrap();

    let cached_ref = h.cluster.secret_ref("default", "db-cred").unwrap();
    let cached_secret = h.cluster.secret("default", OUTPUT).unwrap();
    let ref_before = serde_json::to_value(cached_ref.as_ref()).unwrap();
    let secret_before = serde_json::to_value(cached_secret.as_ref()).unwrap();

    h.set_vault_value("new");
    h.handler.azure_sync_handler("default/db-cred").await.unwrap();

    assert_eq!(serde_json::to_value(cached_ref.as_ref()).unwrap(), ref_before);
    assert_eq!(
        serde_json::to_value(cached_secret.as_ref()).unwrap(),
        secret_before
    );
    assert_eq!(h.status_hash("db-cred"), Some(content_hash("new")));
}

#[tokio::test]
async fn vault_poll_before_secret_exists_is_retryable() {
    let h = Harness::new();
    h.set_vault_value("hunter2");
    h.cluster.insert_ref(akvs("default", "db-cred", OUTPUT));

    let err = h
        .handler
        .azure_sync_handler("default/db-cred")
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcilerError::MaterializedSecretMissing { .. }));
    assert!(err.is_retryable());
    assert!(h.cluster.writes().is_empty());
}

#[tokio::test]
async fn spec_sync_on_stale_cache_retries_when_secret_already_exists() {
    let h = Harness::new();
    h.set_vault_value("hunter2");
    let owner = h.cluster.insert_ref(akvs("default", "db-cred", OUTPUT));
    // Created by a concurrent pass after the cache was last refreshed
    h.cluster.insert_secret(secret_owned_by(&owner, OUTPUT, "hunter2"));
    let handler = h.handler_with_secret_cache(Arc::new(FrozenSecretCache(None)));

    let err = handler.sync_handler("default/db-cred").await.unwrap_err();

    assert!(matches!(
        err,
        ReconcilerError::Store(StoreError::Conflict { .. })
    ));
    assert!(err.is_retryable());
    assert!(h.cluster.writes().is_empty());
    assert_eq!(h.status_hash("db-cred"), None);
}

#[tokio::test]
async fn vault_poll_losing_update_race_retries_without_status_write() {
    let h = Harness::new();
    h.set_vault_value("old");
    h.cluster.insert_ref(akvs("default", "db-cred", OUTPUT));
    h.handler.sync_handler("default/db-cred").await.unwrap();
    let cached = h.cluster.secret("default", OUTPUT).unwrap();
    // A concurrent write bumps the resourceVersion past the cached copy
    h.cluster.insert_secret(Secret::clone(&cached));
    h.cluster.clear_writes();
    let handler = h.handler_with_secret_cache(Arc::new(FrozenSecretCache(Some(cached))));

    h.set_vault_value("new");
    let err = handler
        .azure_sync_handler("default/db-cred")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcilerError::Store(StoreError::Conflict { .. })
    ));
    assert!(err.is_retryable());
    assert!(h.cluster.writes().is_empty());
    assert_eq!(h.status_hash("db-cred"), Some(content_hash("old")));
    assert_eq!(h.output_value().as_deref(), Some("old"));
}
