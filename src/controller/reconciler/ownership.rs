//! # Ownership Resolver
//!
//! Maps a watched object back to the AzureKeyVaultSecret controlling it, so a
//! change to a materialized Secret (a manual edit, a deletion) re-queues its
//! owner for spec sync.

use super::types::{Handler, ReconcilerError};
use crate::crd::{AzureKeyVaultSecret, AZURE_KEY_VAULT_SECRET_KIND};
use crate::observability::metrics;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use std::sync::Arc;
use tracing::{debug, info};

/// An object observed by a watch
#[derive(Debug, Clone)]
pub enum ObjectEvent<K> {
    /// Object as it currently exists
    Live(Arc<K>),
    /// Object observed through a delete. `object` is the last known state,
    /// `None` when it could not be recovered.
    Tombstone { key: String, object: Option<Arc<K>> },
}

impl<K> ObjectEvent<K> {
    /// The object carried by the event
    ///
    /// # Errors
    /// Returns [`ReconcilerError::Decode`] for a tombstone without an object
    pub fn object(&self) -> Result<&K, ReconcilerError> {
        match self {
            ObjectEvent::Live(object) => Ok(object.as_ref()),
            ObjectEvent::Tombstone {
                object: Some(object),
                ..
            } => Ok(object.as_ref()),
            ObjectEvent::Tombstone { key, object: None } => Err(ReconcilerError::Decode(
                format!("error decoding object tombstone for '{key}'"),
            )),
        }
    }
}

/// The owner reference marked as controller, if any
#[must_use]
pub fn controller_of(meta: &ObjectMeta) -> Option<&OwnerReference> {
    meta.owner_references
        .as_ref()?
        .iter()
        .find(|owner| owner.controller == Some(true))
}

/// Whether `object` has a controller owner reference pointing at `owner`
#[must_use]
pub fn is_controlled_by<K: Resource>(object: &K, owner: &AzureKeyVaultSecret) -> bool {
    match (controller_of(object.meta()), owner.metadata.uid.as_deref()) {
        (Some(reference), Some(uid)) => reference.uid == uid,
        _ => false,
    }
}

impl Handler {
    /// Find the AzureKeyVaultSecret controlling the object in `event`
    ///
    /// Returns `Ok(None)` when the object should be skipped: it has no
    /// controller, its controller is of another kind, or its controller no
    /// longer exists.
    ///
    /// # Errors
    /// Returns [`ReconcilerError::Decode`] when a tombstone carries no object
    pub async fn handle_object<K: Resource>(
        &self,
        event: &ObjectEvent<K>,
    ) -> Result<Option<Arc<AzureKeyVaultSecret>>, ReconcilerError> {
        let object = event.object()?;
        let meta = object.meta();
        let name = meta.name.as_deref().unwrap_or_default();
        if matches!(event, ObjectEvent::Tombstone { .. }) {
            info!("Recovered deleted object '{}' from tombstone", name);
        }
        debug!("Processing object: {}", name);

        let Some(owner) = controller_of(meta) else {
            metrics::increment_object_events_skipped("no_controller");
            return Ok(None);
        };
        if owner.kind != AZURE_KEY_VAULT_SECRET_KIND {
            metrics::increment_object_events_skipped("foreign_controller");
            return Ok(None);
        }

        let namespace = meta.namespace.as_deref().unwrap_or_default();
        match self.refs.get_ref(namespace, &owner.name).await {
            Ok(Some(akvs)) => Ok(Some(akvs)),
            Ok(None) => {
                info!(
                    "ignoring orphaned object '{}/{}' of AzureKeyVaultSecret '{}'",
                    namespace, name, owner.name
                );
                metrics::increment_object_events_skipped("orphaned");
                Ok(None)
            }
            Err(e) => {
                info!(
                    error = %e,
                    "ignoring object '{}/{}': AzureKeyVaultSecret '{}' could not be read",
                    namespace, name, owner.name
                );
                metrics::increment_object_events_skipped("orphaned");
                Ok(None)
            }
        }
    }
}
