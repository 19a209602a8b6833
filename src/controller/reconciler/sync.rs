//! # Spec Sync
//!
//! Makes sure the Kubernetes Secret an AzureKeyVaultSecret describes exists
//! and is controlled by it. Never overwrites an existing value; that is the
//! vault poll's job.

use super::key::split_meta_namespace_key;
use super::materialize::create_new_secret;
use super::ownership::is_controlled_by;
use super::types::{Handler, ReconcilerError};
use crate::controller::events::{messages, reasons};
use crate::crd::AzureKeyVaultSecret;
use crate::observability::metrics;
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::events::EventType;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Handler {
    /// Spec sync for the AzureKeyVaultSecret identified by `key`
    ///
    /// A resource that no longer exists is not an error.
    ///
    /// # Errors
    /// - [`ReconcilerError::InvalidKey`] for a malformed key
    /// - [`ReconcilerError::ResourceConflict`] when the output Secret exists
    ///   but is controlled by something else
    /// - any store or vault error while creating the Secret
    pub async fn sync_handler(&self, key: &str) -> Result<(), ReconcilerError> {
        let (namespace, name) = split_meta_namespace_key(key)?;
        let Some(akvs) = self.refs.get_ref(namespace, name).await? else {
            debug!("AzureKeyVaultSecret '{}' in work queue no longer exists", key);
            return Ok(());
        };

        let secret = self.get_or_create_secret(&akvs).await?;

        if !is_controlled_by(secret.as_ref(), &akvs) {
            let secret_name = secret.metadata.name.clone().unwrap_or_default();
            let msg = messages::resource_exists(&secret_name);
            warn!(resource = key, "{}", msg);
            self.recorder
                .record(&akvs, EventType::Warning, reasons::ERR_RESOURCE_EXISTS, msg)
                .await;
            return Err(ReconcilerError::ResourceConflict {
                resource: key.to_string(),
                secret: secret_name,
            });
        }

        self.recorder
            .record(
                &akvs,
                EventType::Normal,
                reasons::SUCCESS_SYNCED,
                messages::RESOURCE_SYNCED.to_string(),
            )
            .await;
        Ok(())
    }

    /// Cached output Secret, or a newly created one with its status recorded
    async fn get_or_create_secret(
        &self,
        akvs: &AzureKeyVaultSecret,
    ) -> Result<Arc<Secret>, ReconcilerError> {
        let secret_name = akvs.spec.output_secret.name.as_str();
        if secret_name.is_empty() {
            return Err(ReconcilerError::MissingOutputName(akvs.key()));
        }
        let namespace = akvs.metadata.namespace.as_deref().unwrap_or_default();

        // Lookup errors other than NotFound are retried rather than treated as absent
        if let Some(secret) = self.secrets.get_secret(namespace, secret_name).await? {
            return Ok(secret);
        }

        let new_secret = match create_new_secret(akvs, None, self.vault.as_ref()).await {
            Ok(secret) => secret,
            Err(e @ ReconcilerError::VaultFetch { .. }) => {
                let msg = messages::failed_azure_key_vault(
                    akvs.metadata.name.as_deref().unwrap_or_default(),
                    &akvs.spec.vault.name,
                );
                warn!(resource = akvs.key().as_str(), error = %e, "{}", msg);
                self.recorder
                    .record(akvs, EventType::Warning, reasons::ERR_AZURE_VAULT, msg)
                    .await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let created = self.secret_writer.create_secret(&new_secret).await?;
        metrics::increment_secrets_created();
        info!(
            resource = akvs.key().as_str(),
            secret = secret_name,
            "Created Secret, updating status for AzureKeyVaultSecret"
        );
        self.update_status(akvs, &created).await?;
        Ok(Arc::new(created))
    }
}
