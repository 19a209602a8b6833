//! Content hash used to detect value changes. Not a security boundary.

/// Lowercase hex MD5 of `value`
#[must_use]
pub fn content_hash(value: &str) -> String {
    format!("{:x}", md5::compute(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        assert_eq!(content_hash(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(content_hash("old"), "149603e6c03516362a8da23f624db945");
    }

    #[test]
    fn test_fixed_width() {
        assert_eq!(content_hash("a much longer secret value than usual").len(), 32);
    }
}
