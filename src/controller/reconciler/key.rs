//! Work queue keys.

use super::types::ReconcilerError;

/// Split a `namespace/name` key. A bare `name` has the empty namespace.
///
/// # Errors
/// Returns [`ReconcilerError::InvalidKey`] for keys with more than one `/`
/// or an empty part.
pub fn split_meta_namespace_key(key: &str) -> Result<(&str, &str), ReconcilerError> {
    let mut parts = key.split('/');
    let parsed = match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) => ("", name),
        (Some(namespace), Some(name), None) if !namespace.is_empty() => (namespace, name),
        _ => return Err(ReconcilerError::InvalidKey(key.to_string())),
    };
    if parsed.1.is_empty() {
        return Err(ReconcilerError::InvalidKey(key.to_string()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_key() {
        assert_eq!(
            split_meta_namespace_key("default/db-cred").unwrap(),
            ("default", "db-cred")
        );
    }

    #[test]
    fn test_cluster_scoped_key() {
        assert_eq!(split_meta_namespace_key("db-cred").unwrap(), ("", "db-cred"));
    }

    #[test]
    fn test_invalid_keys() {
        for key in ["", "a/b/c", "/name", "default/", "/"] {
            assert!(
                matches!(
                    split_meta_namespace_key(key),
                    Err(ReconcilerError::InvalidKey(_))
                ),
                "key {key:?} should be invalid"
            );
        }
    }
}
