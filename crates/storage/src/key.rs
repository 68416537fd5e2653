//! Key validation.
//!
//! Keys are `/`-separated and map directly onto relative file paths for the
//! local backend, so they get the same treatment as any user-controlled path:
//! no escaping the store root, no null bytes, and no hidden segments (those are
//! reserved for in-flight writes).

use crate::error::{ErrorKind, Result};

/// Validates and normalizes a storage key.
///
/// Empty and `.` segments are dropped and `..` pops the previous segment,
/// but never past the root.
///
/// # Examples
///
/// ```
/// use stocktag_storage::validate_key;
/// // Valid keys
/// assert!(validate_key("batch-progress").is_ok());
/// assert!(validate_key("profiles/work/batch-progress").is_ok());
/// // Invalid keys
/// assert!(validate_key("../escape").is_err());
/// assert!(validate_key("a/.hidden").is_err());
/// assert!(validate_key("a\0b").is_err());
/// // Keys get normalized
/// assert_eq!(validate_key("a//./b/../c/").unwrap(), "a/c");
/// ```
pub fn validate(key: impl AsRef<str>) -> Result<String> {
    let key = key.as_ref();
    let invalid = || ErrorKind::InvalidKey(key.to_string());
    let mut segments: Vec<&str> = Vec::new();
    for segment in key.split(['/', '\\']) {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
            s if s.starts_with('.') || s.contains('\0') => exn::bail!(invalid()),
            s => segments.push(s),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(invalid()),
        false => Ok(segments.join("/")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert_eq!(validate("batch-progress").unwrap(), "batch-progress");
        assert_eq!(validate("a/b/c").unwrap(), "a/b/c");
        assert_eq!(validate("progress.json").unwrap(), "progress.json");
    }

    #[test]
    fn test_normalization() {
        assert_eq!(validate("a//b//c").unwrap(), "a/b/c");
        assert_eq!(validate("./a/./b").unwrap(), "a/b");
        assert_eq!(validate("a\\b").unwrap(), "a/b");
        assert_eq!(validate("a/b/..").unwrap(), "a");
        assert_eq!(validate("key/").unwrap(), "key");
    }

    #[test]
    fn test_traversal_attempts() {
        assert!(validate("../etc/passwd").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("..").is_err());
    }

    #[test]
    fn test_hidden_and_null() {
        assert!(validate(".partial").is_err());
        assert!(validate("a/.b").is_err());
        assert!(validate("a\0b").is_err());
    }

    #[test]
    fn test_empty_keys() {
        assert!(validate("").is_err());
        assert!(validate(".").is_err());
        assert!(validate("//").is_err());
        let err = validate("./").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(k) if k == "./"));
    }
}
