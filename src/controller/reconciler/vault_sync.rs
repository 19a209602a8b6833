//! # Vault Poll Sync
//!
//! Compares the value in Azure Key Vault with the hash recorded in status and
//! rewrites the Kubernetes Secret when they differ.
//!
//! The Secret is written before the status hash is advanced. If the process
//! dies between the two writes the next poll still sees a stale hash and
//! repeats the (harmless) update instead of missing the change.

use super::hash::content_hash;
use super::key::split_meta_namespace_key;
use super::materialize::create_new_secret;
use super::ownership::is_controlled_by;
use super::types::{Handler, ReconcilerError};
use crate::controller::events::{messages, reasons};
use crate::observability::metrics;
use kube::runtime::events::EventType;
use tracing::{debug, info, warn};

impl Handler {
    /// Vault poll for the AzureKeyVaultSecret identified by `key`
    ///
    /// # Errors
    /// - [`ReconcilerError::VaultFetch`] when Azure Key Vault cannot be read
    /// - [`ReconcilerError::MaterializedSecretMissing`] when spec sync has not
    ///   created the Secret yet
    /// - [`ReconcilerError::ResourceConflict`] when the Secret is controlled by
    ///   something else
    /// - any store error from the Secret or status write
    pub async fn azure_sync_handler(&self, key: &str) -> Result<(), ReconcilerError> {
        let (namespace, name) = split_meta_namespace_key(key)?;
        debug!("Checking state for {} in Azure", key);
        let Some(akvs) = self.refs.get_ref(namespace, name).await? else {
            debug!("AzureKeyVaultSecret '{}' in work queue no longer exists", key);
            return Ok(());
        };

        debug!("Getting secret value for {} in Azure", key);
        let value = match self.vault.get_secret_value(&akvs).await {
            Ok(value) => value,
            Err(source) => {
                let msg = messages::failed_azure_key_vault(name, &akvs.spec.vault.name);
                warn!(resource = key, error = %source, "{}", msg);
                self.recorder
                    .record(&akvs, EventType::Warning, reasons::ERR_AZURE_VAULT, msg)
                    .await;
                return Err(ReconcilerError::VaultFetch {
                    resource: name.to_string(),
                    vault: akvs.spec.vault.name.clone(),
                    source,
                });
            }
        };

        let secret_hash = content_hash(&value);
        if akvs.observed_hash() == secret_hash {
            debug!("Secret value for {} is unchanged in Azure", key);
            return Ok(());
        }

        info!(
            "Secret has changed in Azure Key Vault for AzureKeyVaultSecret {}. Updating Secret now.",
            key
        );
        let mut desired = create_new_secret(&akvs, Some(&value), self.vault.as_ref()).await?;
        let secret_name = akvs.spec.output_secret.name.as_str();

        let Some(existing) = self.secrets.get_secret(namespace, secret_name).await? else {
            return Err(ReconcilerError::MaterializedSecretMissing {
                resource: key.to_string(),
                secret: secret_name.to_string(),
            });
        };
        if !is_controlled_by(existing.as_ref(), &akvs) {
            let msg = messages::resource_exists(secret_name);
            warn!(resource = key, "{}", msg);
            self.recorder
                .record(&akvs, EventType::Warning, reasons::ERR_RESOURCE_EXISTS, msg)
                .await;
            return Err(ReconcilerError::ResourceConflict {
                resource: key.to_string(),
                secret: secret_name.to_string(),
            });
        }

        desired
            .metadata
            .resource_version
            .clone_from(&existing.metadata.resource_version);
        let updated = self.secret_writer.update_secret(&desired).await?;
        metrics::increment_secrets_updated();

        self.update_status(&akvs, &updated).await?;

        warn!(
            "Secret value will now change for Secret '{}'. Any resources (like Pods) using this Secret must be restarted to pick up the new value.",
            secret_name
        );
        self.recorder
            .record(
                &akvs,
                EventType::Normal,
                reasons::SUCCESS_SYNCED,
                messages::RESOURCE_SYNCED_WITH_AZURE.to_string(),
            )
            .await;
        Ok(())
    }
}
