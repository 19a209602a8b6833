//! # Azure Key Vault Client
//!
//! Reads secret values from Azure Key Vault.
//!
//! One `SecretClient` is created per vault URL and reused for every
//! AzureKeyVaultSecret pointing at that vault. Authentication uses Workload
//! Identity when a client ID is configured, Managed Identity otherwise.

use crate::provider::{vault_url, VaultReader};
use crate::crd::AzureKeyVaultSecret;
use crate::observability::metrics;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use azure_identity::{ManagedIdentityCredential, WorkloadIdentityCredential};
use azure_security_keyvault_secrets::SecretClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Azure Key Vault implementation of [`VaultReader`]
pub struct AzureKeyVaultReader {
    credential: Arc<dyn TokenCredential>,
    clients: Mutex<HashMap<String, Arc<SecretClient>>>,
}

impl std::fmt::Debug for AzureKeyVaultReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let vaults: Vec<String> = self
            .clients
            .lock()
            .map(|clients| clients.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("AzureKeyVaultReader")
            .field("vaults", &vaults)
            .finish_non_exhaustive()
    }
}

impl AzureKeyVaultReader {
    /// Create a reader authenticating with Workload Identity when
    /// `client_id` is set, Managed Identity otherwise
    /// # Errors
    /// Returns an error if the Azure credential cannot be created
    pub fn new(client_id: Option<&str>) -> Result<Self> {
        let credential: Arc<dyn TokenCredential> = match client_id {
            Some(client_id) => {
                info!(
                    "Using Azure Workload Identity authentication with client ID: {}",
                    client_id
                );
                let options = azure_identity::WorkloadIdentityCredentialOptions {
                    client_id: Some(client_id.to_string()),
                    ..Default::default()
                };
                WorkloadIdentityCredential::new(Some(options))
                    .context("Failed to create WorkloadIdentityCredential")?
            }
            None => {
                info!("No Azure client ID configured, using Managed Identity");
                ManagedIdentityCredential::new(None)
                    .context("Failed to create ManagedIdentityCredential")?
            }
        };

        Ok(Self {
            credential,
            clients: Mutex::new(HashMap::new()),
        })
    }

    fn client_for(&self, vault_name: &str) -> Result<Arc<SecretClient>> {
        let url = vault_url(vault_name);
        let mut clients = self
            .clients
            .lock()
            .map_err(|e| anyhow!("Azure client cache poisoned: {e}"))?;
        if let Some(client) = clients.get(&url) {
            return Ok(Arc::clone(client));
        }

        debug!(vault.url = url.as_str(), "Creating Azure Key Vault SecretClient");
        let client = Arc::new(
            SecretClient::new(&url, Arc::clone(&self.credential), None)
                .context("Failed to create Azure Key Vault SecretClient")?,
        );
        clients.insert(url, Arc::clone(&client));
        Ok(client)
    }
}

#[async_trait]
impl VaultReader for AzureKeyVaultReader {
    async fn get_secret_value(&self, akvs: &AzureKeyVaultSecret) -> Result<String> {
        let vault_name = akvs.spec.vault.name.as_str();
        let secret_name = akvs.spec.vault.object.name.as_str();
        let span = tracing::debug_span!(
            "azure.keyvault.secret.get",
            secret.name = secret_name,
            vault.name = vault_name,
            operation.success = tracing::field::Empty,
            operation.duration_ms = tracing::field::Empty,
            error.message = tracing::field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            let client = self.client_for(vault_name)?;
            let result = match client.get_secret(secret_name, None).await {
                Ok(response) => {
                    use azure_security_keyvault_secrets::models::Secret;
                    serde_json::from_slice::<Secret>(&response.into_body())
                        .map_err(|e| anyhow!("Failed to deserialize Azure secret response: {e}"))
                        .and_then(|secret| {
                            secret.value.ok_or_else(|| {
                                anyhow!(
                                    "Azure secret '{secret_name}' in vault '{vault_name}' has no value"
                                )
                            })
                        })
                }
                Err(e) => Err(anyhow!(
                    "Failed to get Azure secret '{secret_name}' from vault '{vault_name}': {e}"
                )),
            };

            let elapsed = start.elapsed();
            span_clone.record("operation.success", result.is_ok());
            span_clone.record(
                "operation.duration_ms",
                u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            );
            if let Err(e) = &result {
                span_clone.record("error.message", e.to_string().as_str());
            }
            metrics::record_vault_operation(elapsed.as_secs_f64(), result.is_ok());
            result
        }
        .instrument(span)
        .await
    }
}
