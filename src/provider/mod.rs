//! # Vault Providers
//!
//! Sources of secret values for AzureKeyVaultSecret resources.
//!
//! - `azure`: Azure Key Vault via the Azure SDK
//! - `memory`: in-memory vault used by tests

use crate::crd::AzureKeyVaultSecret;
use anyhow::Result;
use async_trait::async_trait;

pub mod azure;
pub mod memory;

pub use azure::AzureKeyVaultReader;
pub use memory::InMemoryVault;

/// Reads the current value of the vault object an AzureKeyVaultSecret points at
#[async_trait]
pub trait VaultReader: Send + Sync {
    /// Latest version of `akvs.spec.vault.object`. A missing object or an
    /// object without a value is an error.
    async fn get_secret_value(&self, akvs: &AzureKeyVaultSecret) -> Result<String>;
}

/// Vault URL for a vault name. Full `https://` URLs are passed through.
#[must_use]
pub fn vault_url(vault_name: &str) -> String {
    if vault_name.starts_with("https://") {
        vault_name.to_string()
    } else {
        format!("https://{vault_name}.vault.azure.net/")
    }
}
