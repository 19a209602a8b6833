//! # AzureKeyVaultSecret Spec
//!
//! Main CRD specification types and default values.

use serde::{Deserialize, Serialize};

/// AzureKeyVaultSecret Custom Resource Definition
///
/// Declares that one secret object in an Azure Key Vault should be mirrored
/// into one key of one Kubernetes Secret in the same namespace.
///
/// # Example
///
/// ```yaml
/// apiVersion: azure-keyvault-controller.spv.no/v1alpha1
/// kind: AzureKeyVaultSecret
/// metadata:
///   name: db-cred
///   namespace: default
/// spec:
///   vault:
///     name: kv1
///     object:
///       name: db-pass
///       type: secret
///   outputSecret:
///     name: db-secret
///     keyName: password
///     type: Opaque
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "AzureKeyVaultSecret",
    group = "azure-keyvault-controller.spv.no",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::AzureKeyVaultSecretStatus",
    shortname = "akvs",
    printcolumn = r#"{"name":"Vault", "type":"string", "jsonPath":".spec.vault.name"}, {"name":"Secret Name", "type":"string", "jsonPath":".spec.outputSecret.name"}, {"name":"Hash", "type":"string", "jsonPath":".status.secretHash"}, {"name":"Last Update", "type":"string", "jsonPath":".status.lastAzureUpdate"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AzureKeyVaultSecretSpec {
    /// Where the value lives in Azure Key Vault
    pub vault: AzureKeyVault,
    /// Kubernetes Secret the value is written to
    pub output_secret: OutputSecret,
}

/// Azure Key Vault coordinates
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureKeyVault {
    /// Key Vault name (e.g. "kv1") or a full vault URL ("https://kv1.vault.azure.net/")
    pub name: String,
    /// Object inside the vault
    pub object: AzureKeyVaultObject,
}

/// A single object stored in Azure Key Vault
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureKeyVaultObject {
    /// Object name in the vault
    pub name: String,
    #[serde(default = "default_object_type", rename = "type")]
    pub object_type: AzureKeyVaultObjectType,
}

/// Supported Key Vault object types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AzureKeyVaultObjectType {
    Secret,
}

/// Output Kubernetes Secret descriptor
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputSecret {
    /// Name of the Kubernetes Secret. Required.
    pub name: String,
    /// Key inside the Secret data map that receives the value
    pub key_name: String,
    /// Kubernetes Secret type
    /// Default: "Opaque"
    #[serde(default = "default_secret_type", rename = "type")]
    pub secret_type: String,
}

/// Default value for the vault object type
pub fn default_object_type() -> AzureKeyVaultObjectType {
    AzureKeyVaultObjectType::Secret
}

/// Default value for the output secret type
pub fn default_secret_type() -> String {
    "Opaque".to_string()
}

impl AzureKeyVaultSecret {
    /// `namespace/name` identity used as the work queue key
    #[must_use]
    pub fn key(&self) -> String {
        let name = self.metadata.name.as_deref().unwrap_or_default();
        match self.metadata.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{ns}/{name}"),
            _ => name.to_string(),
        }
    }

    /// Hash recorded by the last successful sync, empty when never synced
    #[must_use]
    pub fn observed_hash(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.secret_hash.as_deref())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_spec_deserializes_with_defaults() {
        let spec: AzureKeyVaultSecretSpec = serde_json::from_value(serde_json::json!({
            "vault": { "name": "kv1", "object": { "name": "db-pass" } },
            "outputSecret": { "name": "db-secret", "keyName": "password" }
        }))
        .unwrap();

        assert_eq!(spec.vault.object.object_type, AzureKeyVaultObjectType::Secret);
        assert_eq!(spec.output_secret.secret_type, "Opaque");
        assert_eq!(spec.output_secret.key_name, "password");
    }

    #[test]
    fn test_key_includes_namespace() {
        let mut akvs = AzureKeyVaultSecret::new(
            "db-cred",
            serde_json::from_value(serde_json::json!({
                "vault": { "name": "kv1", "object": { "name": "db-pass" } },
                "outputSecret": { "name": "db-secret", "keyName": "password" }
            }))
            .unwrap(),
        );
        assert_eq!(akvs.key(), "db-cred");

        akvs.metadata.namespace = Some("default".to_string());
        assert_eq!(akvs.key(), "default/db-cred");
        assert_eq!(akvs.observed_hash(), "");
    }

    #[test]
    fn test_crd_has_status_subresource() {
        let crd = AzureKeyVaultSecret::crd();
        assert_eq!(crd.spec.group, "azure-keyvault-controller.spv.no");
        assert_eq!(crd.spec.names.kind, "AzureKeyVaultSecret");
        let version = &crd.spec.versions[0];
        assert!(version
            .subresources
            .as_ref()
            .and_then(|s| s.status.as_ref())
            .is_some());
    }
}
