//! # Reconciler
//!
//! Core reconciliation logic for `AzureKeyVaultSecret` resources.
//!
//! Two entry points share one [`Handler`]:
//! - `sync_handler` (spec sync): makes sure the output Secret exists and is
//!   controlled by its AzureKeyVaultSecret
//! - `azure_sync_handler` (vault poll): rewrites the Secret when the value in
//!   Azure Key Vault changed
//!
//! `handle_object` maps changes to owned Secrets back to their owner so they
//! can be queued for spec sync.
//!
//! ## Reconciliation Flow
//!
//! 1. Split the work queue key and look the resource up in the cache
//! 2. Create the Secret on first sync, or fetch the vault value on poll
//! 3. Compare the content hash against status
//! 4. Write the Secret, then the status
//! 5. Record an event

pub mod hash;
pub mod key;
pub mod materialize;
pub mod ownership;
pub mod status;
pub mod sync;
pub mod types;
pub mod vault_sync;

#[cfg(test)]
pub(crate) mod fixtures;

pub use hash::content_hash;
pub use key::split_meta_namespace_key;
pub use materialize::{create_new_secret, secret_value};
pub use ownership::{controller_of, is_controlled_by, ObjectEvent};
pub use status::observed_status;
pub use types::{Handler, ReconcilerError};
