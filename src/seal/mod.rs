//! # Sealing
//!
//! Preconditions around the sealing engine and the engine seam itself.
//!
//! [`seal_manifest`] is the one entry point the reconciler uses. It checks the
//! canonical manifest ([`prepare_secret`]) before handing it to a
//! [`SealingEngine`]. An engine never sees a multi-document input, a secret
//! without a name, or empty data that was not explicitly allowed.

mod hybrid;
mod sealed_secret;

pub use hybrid::HybridSealer;
pub use sealed_secret::{SealedSecret, SealedSecretMetadata, SealedSecretSpec, SecretTemplate};

use crate::certificate::PublicKeyMaterial;
use crate::constants::{CLUSTER_WIDE_ANNOTATION, NAMESPACE_WIDE_ANNOTATION};
use crate::error::{KubesealError, Result};
use k8s_openapi::api::core::v1::Secret;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// How tightly a sealed value is bound to its target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SealingScope {
    /// Only decryptable as `namespace/name`
    #[default]
    Strict,
    /// Any name within the namespace
    NamespaceWide,
    /// Any name in any namespace
    ClusterWide,
}

impl SealingScope {
    /// OAEP label binding the ciphertext to its target
    #[must_use]
    pub fn label(&self, name: &str, namespace: &str) -> String {
        match self {
            SealingScope::Strict => format!("{namespace}/{name}"),
            SealingScope::NamespaceWide => namespace.to_string(),
            SealingScope::ClusterWide => String::new(),
        }
    }

    /// Annotation the controller reads to pick the same label on decryption
    #[must_use]
    pub fn annotation(&self) -> Option<&'static str> {
        match self {
            SealingScope::Strict => None,
            SealingScope::NamespaceWide => Some(NAMESPACE_WIDE_ANNOTATION),
            SealingScope::ClusterWide => Some(CLUSTER_WIDE_ANNOTATION),
        }
    }
}

impl fmt::Display for SealingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SealingScope::Strict => "strict",
            SealingScope::NamespaceWide => "namespace-wide",
            SealingScope::ClusterWide => "cluster-wide",
        })
    }
}

/// Hybrid-encryption step turning a prepared secret into sealed YAML
pub trait SealingEngine: Send + Sync {
    /// Seal `secret` for the controller owning `key`
    ///
    /// # Errors
    ///
    /// Any failure is reported as [`KubesealError::Sealing`].
    fn seal(&self, secret: &Secret, key: &PublicKeyMaterial, scope: SealingScope)
        -> Result<String>;
}

/// Check the preconditions, then seal
///
/// # Errors
///
/// Precondition failures are [`KubesealError::ManifestValidation`] and the
/// engine is not called. Engine failures are passed through unchanged.
pub fn seal_manifest(
    manifest: &[u8],
    key: &PublicKeyMaterial,
    scope: SealingScope,
    allow_empty_data: bool,
    engine: &dyn SealingEngine,
) -> Result<String> {
    let mut secret = prepare_secret(manifest, allow_empty_data)?;
    apply_scope(&mut secret, scope);
    engine.seal(&secret, key, scope)
}

/// Parse a single secret document and strip what the server would assign
///
/// # Errors
///
/// Rejects multi-document input, anything that is not a secret, an empty
/// name, and empty `data`/`stringData` unless `allow_empty_data` is set.
pub fn prepare_secret(manifest: &[u8], allow_empty_data: bool) -> Result<Secret> {
    let mut documents = serde_yaml::Deserializer::from_slice(manifest);
    let Some(document) = documents.next() else {
        return Err(KubesealError::validation("manifest holds no document"));
    };
    if documents.next().is_some() {
        return Err(KubesealError::validation(
            "multi-document manifests are not supported",
        ));
    }

    let mut secret = Secret::deserialize(document)
        .map_err(|e| KubesealError::validation(format!("manifest is not a secret: {e}")))?;

    if secret.metadata.name.as_deref().is_none_or(str::is_empty) {
        return Err(KubesealError::validation("missing metadata.name"));
    }

    let no_data = secret.data.as_ref().is_none_or(|d| d.is_empty());
    let no_string_data = secret.string_data.as_ref().is_none_or(|d| d.is_empty());
    if no_data && no_string_data && !allow_empty_data {
        return Err(KubesealError::validation(
            "secret has no data; set allow_empty_data to seal it anyway",
        ));
    }

    let metadata = &mut secret.metadata;
    metadata.uid = None;
    metadata.resource_version = None;
    metadata.self_link = None;
    metadata.generation = None;
    metadata.creation_timestamp = None;
    metadata.deletion_timestamp = None;
    metadata.deletion_grace_period_seconds = None;
    metadata.managed_fields = None;

    debug!(
        "Prepared secret {} for sealing",
        secret.metadata.name.as_deref().unwrap_or_default()
    );
    Ok(secret)
}

fn apply_scope(secret: &mut Secret, scope: SealingScope) {
    if let Some(annotation) = scope.annotation() {
        secret
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(annotation.to_string(), "true".to_string());
    }
}
