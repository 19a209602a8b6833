//! # Azure Providers
//!
//! - `key_vault`: Azure Key Vault secret reads

pub mod key_vault;

pub use key_vault::AzureKeyVaultReader;
