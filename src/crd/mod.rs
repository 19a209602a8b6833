//! # Custom Resource Definitions
//!
//! CRD types for the Azure Key Vault controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `AzureKeyVaultSecret` specification and default values
//! - `status.rs` - Status written back by the status updater

mod spec;
mod status;

pub use spec::{
    default_object_type, default_secret_type, AzureKeyVault, AzureKeyVaultObject,
    AzureKeyVaultObjectType, AzureKeyVaultSecret, AzureKeyVaultSecretSpec, OutputSecret,
};
pub use status::AzureKeyVaultSecretStatus;

/// Kind name used in owner references pointing at an `AzureKeyVaultSecret`
pub const AZURE_KEY_VAULT_SECRET_KIND: &str = "AzureKeyVaultSecret";
