//! # SealedSecret Document
//!
//! Serialized layout of the sealed artifact the controller consumes.

use crate::constants::{SEALED_SECRET_API_VERSION, SEALED_SECRET_KIND};
use crate::error::{KubesealError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedSecret {
    pub api_version: String,
    pub kind: String,
    pub metadata: SealedSecretMetadata,
    pub spec: SealedSecretSpec,
}

/// Metadata block shared by the sealed document and its template
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedSecretMetadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Always serialized, as `null`, to match what the controller emits
    #[serde(default)]
    pub creation_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedSecretSpec {
    pub encrypted_data: BTreeMap<String, String>,
    pub template: SecretTemplate,
}

/// Shape of the secret the controller will create on decryption
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SecretTemplate {
    pub metadata: SealedSecretMetadata,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
}

impl SealedSecret {
    #[must_use]
    pub fn new(
        metadata: SealedSecretMetadata,
        encrypted_data: BTreeMap<String, String>,
        secret_type: Option<String>,
    ) -> Self {
        Self {
            api_version: SEALED_SECRET_API_VERSION.to_string(),
            kind: SEALED_SECRET_KIND.to_string(),
            metadata: metadata.clone(),
            spec: SealedSecretSpec {
                encrypted_data,
                template: SecretTemplate {
                    metadata,
                    secret_type,
                },
            },
        }
    }

    /// # Errors
    ///
    /// Fails if the document cannot be serialized.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| KubesealError::Sealing(format!("cannot serialize sealed secret: {e}")))
    }

    /// # Errors
    ///
    /// Fails if `text` is not a sealed secret document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let document: Self = serde_yaml::from_str(text)
            .map_err(|e| KubesealError::Sealing(format!("cannot parse sealed secret: {e}")))?;
        if document.kind != SEALED_SECRET_KIND {
            return Err(KubesealError::Sealing(format!(
                "expected kind {SEALED_SECRET_KIND}, found {}",
                document.kind
            )));
        }
        Ok(document)
    }
}
