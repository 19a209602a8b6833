//! # Secret Materializer
//!
//! Builds the Kubernetes Secret an AzureKeyVaultSecret describes.

use super::types::ReconcilerError;
use crate::crd::AzureKeyVaultSecret;
use crate::provider::VaultReader;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use kube::Resource;
use std::collections::BTreeMap;

/// Build the desired Secret for `akvs`
///
/// Uses `value` when given, otherwise reads the current value from `vault`.
/// The Secret carries a controller owner reference back to `akvs` so the
/// ownership resolver can find its parent, and is written through
/// `stringData`.
///
/// # Errors
/// - [`ReconcilerError::MissingOutputName`] when `outputSecret.name` is empty
/// - [`ReconcilerError::MissingOwnerIdentity`] when `akvs` has no uid
/// - [`ReconcilerError::VaultFetch`] when the vault read fails
pub async fn create_new_secret(
    akvs: &AzureKeyVaultSecret,
    value: Option<&str>,
    vault: &dyn VaultReader,
) -> Result<Secret, ReconcilerError> {
    let output = &akvs.spec.output_secret;
    if output.name.is_empty() {
        return Err(ReconcilerError::MissingOutputName(akvs.key()));
    }
    let owner = akvs
        .controller_owner_ref(&())
        .ok_or_else(|| ReconcilerError::MissingOwnerIdentity(akvs.key()))?;

    let value = match value {
        Some(value) => value.to_string(),
        None => vault
            .get_secret_value(akvs)
            .await
            .map_err(|source| ReconcilerError::VaultFetch {
                resource: akvs.metadata.name.clone().unwrap_or_default(),
                vault: akvs.spec.vault.name.clone(),
                source,
            })?,
    };

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(output.name.clone()),
            namespace: akvs.metadata.namespace.clone(),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        },
        type_: Some(output.secret_type.clone()),
        string_data: Some(BTreeMap::from([(output.key_name.clone(), value)])),
        ..Secret::default()
    })
}

/// Value stored under `key` in a Secret, read from `data` first and then
/// from `stringData`
#[must_use]
pub fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    if let Some(bytes) = secret.data.as_ref().and_then(|data| data.get(key)) {
        return Some(String::from_utf8_lossy(&bytes.0).into_owned());
    }
    secret
        .string_data
        .as_ref()
        .and_then(|string_data| string_data.get(key))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::fixtures::akvs;
    use crate::provider::InMemoryVault;
    use k8s_openapi::ByteString;

    #[tokio::test]
    async fn test_uses_supplied_value_without_vault_read() {
        let vault = InMemoryVault::new();
        let resource = akvs("default", "db-cred", "db-secret");

        let secret = create_new_secret(&resource, Some("s3cret"), &vault).await.unwrap();

        assert_eq!(vault.reads(), 0);
        assert_eq!(secret.metadata.name.as_deref(), Some("db-secret"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert_eq!(secret_value(&secret, "password").as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn test_sets_controller_owner_reference() {
        let vault = InMemoryVault::new();
        let resource = akvs("default", "db-cred", "db-secret");

        let secret = create_new_secret(&resource, Some("v"), &vault).await.unwrap();
        let owners = secret.metadata.owner_references.unwrap();

        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "AzureKeyVaultSecret");
        assert_eq!(owners[0].api_version, "azure-keyvault-controller.spv.no/v1alpha1");
        assert_eq!(owners[0].name, "db-cred");
        assert_eq!(Some(&owners[0].uid), resource.metadata.uid.as_ref());
        assert_eq!(owners[0].controller, Some(true));
    }

    #[tokio::test]
    async fn test_reads_vault_when_no_value_given() {
        let vault = InMemoryVault::new();
        vault.set_value("kv1", "db-pass", "from-vault");
        let resource = akvs("default", "db-cred", "db-secret");

        let secret = create_new_secret(&resource, None, &vault).await.unwrap();

        assert_eq!(vault.reads(), 1);
        assert_eq!(secret_value(&secret, "password").as_deref(), Some("from-vault"));
    }

    #[tokio::test]
    async fn test_vault_failure_is_vault_fetch_error() {
        let vault = InMemoryVault::new();
        let resource = akvs("default", "db-cred", "db-secret");

        let err = create_new_secret(&resource, None, &vault).await.unwrap_err();

        assert!(matches!(err, ReconcilerError::VaultFetch { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_output_name() {
        let vault = InMemoryVault::new();
        let resource = akvs("default", "db-cred", "");

        let err = create_new_secret(&resource, Some("v"), &vault).await.unwrap_err();
        assert!(matches!(err, ReconcilerError::MissingOutputName(_)));
    }

    #[tokio::test]
    async fn test_missing_uid() {
        let vault = InMemoryVault::new();
        let mut resource = akvs("default", "db-cred", "db-secret");
        resource.metadata.uid = None;

        let err = create_new_secret(&resource, Some("v"), &vault).await.unwrap_err();
        assert!(matches!(err, ReconcilerError::MissingOwnerIdentity(_)));
    }

    #[test]
    fn test_secret_value_prefers_data() {
        let secret = Secret {
            data: Some(BTreeMap::from([(
                "password".to_string(),
                ByteString(b"from-data".to_vec()),
            )])),
            string_data: Some(BTreeMap::from([(
                "password".to_string(),
                "from-string-data".to_string(),
            )])),
            ..Secret::default()
        };
        assert_eq!(secret_value(&secret, "password").as_deref(), Some("from-data"));
        assert_eq!(secret_value(&secret, "missing"), None);
    }
}
