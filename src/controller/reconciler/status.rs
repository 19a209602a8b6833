//! # Status Updater
//!
//! Records the hash of the materialized value and the time it was written.

use super::hash::content_hash;
use super::materialize::secret_value;
use super::types::{Handler, ReconcilerError};
use crate::crd::{AzureKeyVaultSecret, AzureKeyVaultSecretStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::Secret;
use tracing::debug;

/// Status describing `secret` as materialized for `akvs` at `now`
#[must_use]
pub fn observed_status(
    akvs: &AzureKeyVaultSecret,
    secret: &Secret,
    now: DateTime<Utc>,
) -> AzureKeyVaultSecretStatus {
    let value = secret_value(secret, &akvs.spec.output_secret.key_name).unwrap_or_default();
    AzureKeyVaultSecretStatus {
        secret_hash: Some(content_hash(&value)),
        last_azure_update: Some(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
    }
}

impl Handler {
    /// Write the status of `akvs` to match `secret`
    ///
    /// `akvs` is a shared cache snapshot and is never modified; the status is
    /// set on a private copy that only goes to the status subresource.
    pub(crate) async fn update_status(
        &self,
        akvs: &AzureKeyVaultSecret,
        secret: &Secret,
    ) -> Result<AzureKeyVaultSecret, ReconcilerError> {
        let mut copy = akvs.clone();
        copy.status = Some(observed_status(akvs, secret, Utc::now()));
        debug!(
            resource = akvs.key().as_str(),
            secret_hash = copy.observed_hash(),
            "Updating AzureKeyVaultSecret status"
        );
        Ok(self.ref_writer.update_status(&copy).await?)
    }
}
