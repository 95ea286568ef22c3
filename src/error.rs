//! # Errors
//!
//! Failure taxonomy for the sealing pipeline.
//!
//! Every stage returns on its first failure and wraps the cause in one of
//! these variants. Nothing is downgraded or swallowed on the way up, so the
//! caller always sees which stage failed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KubesealError {
    /// Malformed connection fields (exec block, conflicting paths, bad host)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cluster unreachable, TLS or auth failure
    #[error("connection to controller {namespace}/{name} failed: {message}")]
    Connection {
        name: String,
        namespace: String,
        message: String,
    },

    /// Certificate endpoint answered with a non-success status or nothing at all
    #[error("cannot fetch certificate from controller {namespace}/{name}: {message}")]
    Certificate {
        name: String,
        namespace: String,
        message: String,
    },

    /// No certificate in the bundle, or a key that is not RSA
    #[error("failed to parse public key: {0}")]
    KeyParse(String),

    /// Plaintext secret rejected before the sealing engine is invoked
    #[error("invalid secret manifest: {0}")]
    ManifestValidation(String),

    /// Opaque failure from the sealing engine
    #[error("sealing failed: {0}")]
    Sealing(String),
}

/// Stable classification of [`KubesealError`], used for metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Certificate,
    KeyParse,
    ManifestValidation,
    Sealing,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Connection => "connection",
            ErrorKind::Certificate => "certificate",
            ErrorKind::KeyParse => "key-parse",
            ErrorKind::ManifestValidation => "manifest-validation",
            ErrorKind::Sealing => "sealing",
        }
    }
}

impl KubesealError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            KubesealError::Configuration(_) => ErrorKind::Configuration,
            KubesealError::Connection { .. } => ErrorKind::Connection,
            KubesealError::Certificate { .. } => ErrorKind::Certificate,
            KubesealError::KeyParse(_) => ErrorKind::KeyParse,
            KubesealError::ManifestValidation(_) => ErrorKind::ManifestValidation,
            KubesealError::Sealing(_) => ErrorKind::Sealing,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        KubesealError::Configuration(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        KubesealError::ManifestValidation(message.into())
    }
}

pub type Result<T, E = KubesealError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_error_names_controller() {
        let err = KubesealError::Certificate {
            name: "sealed-secrets-controller".to_string(),
            namespace: "kube-system".to_string(),
            message: "404 Not Found".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("kube-system/sealed-secrets-controller"));
        assert!(rendered.contains("404"));
        assert_eq!(err.kind(), ErrorKind::Certificate);
    }

    #[test]
    fn test_kind_labels_are_distinct() {
        let kinds = [
            ErrorKind::Configuration,
            ErrorKind::Connection,
            ErrorKind::Certificate,
            ErrorKind::KeyParse,
            ErrorKind::ManifestValidation,
            ErrorKind::Sealing,
        ];
        let labels: std::collections::HashSet<_> = kinds.iter().map(ErrorKind::as_str).collect();
        assert_eq!(labels.len(), kinds.len());
    }
}
