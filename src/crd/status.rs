//! # AzureKeyVaultSecret Status
//!
//! Observed state written back after a Kubernetes Secret was materialized.

use serde::{Deserialize, Serialize};

/// Status of the AzureKeyVaultSecret resource
///
/// Only the status updater writes this block.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureKeyVaultSecretStatus {
    /// Hex MD5 of the value currently materialized in the Kubernetes Secret
    #[serde(default)]
    pub secret_hash: Option<String>,
    /// Last time the Kubernetes Secret was written from Azure Key Vault (RFC3339)
    #[serde(default)]
    pub last_azure_update: Option<String>,
}
