//! # Resource State
//!
//! Declarative input snapshot and the recorded state of one sealed secret.

use crate::error::{KubesealError, Result};
use crate::manifest::{SecretSpec, SecretValue};
use crate::seal::SealingScope;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Immutable snapshot of the declarative fields for one resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SecretResource {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub secrets: BTreeMap<String, SecretValue>,
    pub controller_name: String,
    pub controller_namespace: String,
    #[serde(default)]
    pub scope: SealingScope,
    #[serde(default)]
    pub allow_empty_data: bool,
}

impl SecretResource {
    /// Validated secret spec for this resource
    ///
    /// # Errors
    ///
    /// Rejects an empty name, namespace, controller name or controller namespace.
    pub fn spec(&self) -> Result<SecretSpec> {
        if self.controller_name.is_empty() || self.controller_namespace.is_empty() {
            return Err(KubesealError::validation(
                "controller_name and controller_namespace are required",
            ));
        }
        SecretSpec::new(
            self.name.clone(),
            self.namespace.clone(),
            self.secret_type.clone(),
            self.secrets.clone(),
        )
    }
}

/// Recorded state: identity, last-applied key set and sealed manifest
///
/// Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResourceState {
    pub id: String,
    pub keys: BTreeSet<String>,
    pub manifest: String,
}

impl ResourceState {
    #[must_use]
    pub fn new(keys: BTreeSet<String>, manifest: String) -> Self {
        Self {
            id: identity(&manifest),
            keys,
            manifest,
        }
    }
}

/// Lowercase hex SHA-256 of the sealed text
#[must_use]
pub fn identity(sealed: &str) -> String {
    format!("{:x}", Sha256::digest(sealed.as_bytes()))
}
