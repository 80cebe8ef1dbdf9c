//! Domain error types
//!
//! Errors raised by the pure value types of the domain: identity keys,
//! content hashes and the path algebra.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A combined `{hash}_{name}` key could not be split
    #[error("Malformed object key: {0}")]
    MalformedKey(String),

    /// Invalid content hash (expected 40 hex digits)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// A path argument was expected to be relative
    #[error("Not a relative path: {0}")]
    NotRelative(String),

    /// A path argument was expected to be absolute
    #[error("Not an absolute path: {0}")]
    NotAbsolute(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::MalformedKey("nounderscore".to_string());
        assert_eq!(err.to_string(), "Malformed object key: nounderscore");

        let err = DomainError::NotRelative("/a/b".to_string());
        assert_eq!(err.to_string(), "Not a relative path: /a/b");

        let err = DomainError::NotAbsolute("a/b".to_string());
        assert_eq!(err.to_string(), "Not an absolute path: a/b");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidHash("xyz".to_string());
        let err2 = DomainError::InvalidHash("xyz".to_string());
        let err3 = DomainError::InvalidHash("abc".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
