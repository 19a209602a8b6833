//! Test fixtures shared by the reconciler unit tests.

use crate::crd::{
    AzureKeyVault, AzureKeyVaultObject, AzureKeyVaultObjectType, AzureKeyVaultSecret,
    AzureKeyVaultSecretSpec, OutputSecret,
};

/// AzureKeyVaultSecret reading `kv1/db-pass` into `<output>.password`
pub(crate) fn akvs(namespace: &str, name: &str, output: &str) -> AzureKeyVaultSecret {
    let mut resource = AzureKeyVaultSecret::new(
        name,
        AzureKeyVaultSecretSpec {
            vault: AzureKeyVault {
                name: "kv1".to_string(),
                object: AzureKeyVaultObject {
                    name: "db-pass".to_string(),
                    object_type: AzureKeyVaultObjectType::Secret,
                },
            },
            output_secret: OutputSecret {
                name: output.to_string(),
                key_name: "password".to_string(),
                secret_type: "Opaque".to_string(),
            },
        },
    );
    resource.metadata.namespace = Some(namespace.to_string());
    resource.metadata.uid = Some(format!("uid-{namespace}-{name}"));
    resource
}
