//! # Hybrid Sealer
//!
//! Sealed-secrets compatible hybrid encryption.
//!
//! Each value gets its own random AES-256-GCM session key. The session key
//! is wrapped with RSA-OAEP (SHA-256) under the controller key, labelled with
//! the scope label, so the controller refuses to decrypt it anywhere else.
//!
//! ```text
//! | len(rsa ciphertext): u16 BE | rsa ciphertext | aes-gcm ciphertext + tag |
//! ```
//!
//! The session key is used once, so the nonce is fixed at zero.

use super::{SealedSecret, SealedSecretMetadata, SealingEngine, SealingScope};
use crate::certificate::PublicKeyMaterial;
use crate::constants::{DEFAULT_NAMESPACE, SESSION_KEY_BYTES};
use crate::error::{KubesealError, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s_openapi::api::core::v1::Secret;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::Oaep;
use sha2::Sha256;
use std::collections::BTreeMap;
use tracing::debug;
use zeroize::Zeroizing;

const NONCE: [u8; 12] = [0; 12];

/// Default [`SealingEngine`]
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridSealer;

impl HybridSealer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Encrypt one value under `label`
    ///
    /// # Errors
    ///
    /// Fails if the key is too small for an OAEP-wrapped session key.
    pub fn encrypt_value(
        &self,
        key: &PublicKeyMaterial,
        label: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        let mut session_key = Zeroizing::new([0_u8; SESSION_KEY_BYTES]);
        OsRng.fill_bytes(session_key.as_mut_slice());

        let wrapped = key
            .rsa()
            .encrypt(&mut OsRng, Oaep::new_with_label::<Sha256, _>(label), session_key.as_slice())
            .map_err(|e| KubesealError::Sealing(format!("cannot wrap session key: {e}")))?;
        let wrapped_len = u16::try_from(wrapped.len())
            .map_err(|e| KubesealError::Sealing(format!("wrapped session key too long: {e}")))?;

        let cipher = Aes256Gcm::new_from_slice(session_key.as_slice())
            .map_err(|e| KubesealError::Sealing(format!("invalid session key: {e}")))?;
        let sealed = cipher
            .encrypt(Nonce::from_slice(&NONCE), plaintext)
            .map_err(|e| KubesealError::Sealing(format!("cannot encrypt value: {e}")))?;

        let mut payload = Vec::with_capacity(2 + wrapped.len() + sealed.len());
        payload.extend_from_slice(&wrapped_len.to_be_bytes());
        payload.extend_from_slice(&wrapped);
        payload.extend_from_slice(&sealed);
        Ok(payload)
    }
}

impl SealingEngine for HybridSealer {
    fn seal(
        &self,
        secret: &Secret,
        key: &PublicKeyMaterial,
        scope: SealingScope,
    ) -> Result<String> {
        let name = secret
            .metadata
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| KubesealError::Sealing("secret has no name".to_string()))?;
        let namespace = secret
            .metadata
            .namespace
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let label = scope.label(&name, &namespace);

        // stringData wins over data, as on the API server
        let mut plaintext: BTreeMap<String, Vec<u8>> = secret
            .data
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.0.clone()))
            .collect();
        for (k, v) in secret.string_data.iter().flatten() {
            plaintext.insert(k.clone(), v.clone().into_bytes());
        }

        let mut encrypted_data = BTreeMap::new();
        for (k, v) in plaintext {
            let value = Zeroizing::new(v);
            let payload = self.encrypt_value(key, &label, &value)?;
            encrypted_data.insert(k, STANDARD.encode(payload));
        }

        let metadata = SealedSecretMetadata {
            annotations: secret.metadata.annotations.clone().unwrap_or_default(),
            creation_timestamp: None,
            labels: secret.metadata.labels.clone().unwrap_or_default(),
            name,
            namespace,
        };
        debug!(
            "Sealed {} value(s) for {}/{} with {} scope",
            encrypted_data.len(),
            metadata.namespace,
            metadata.name,
            scope
        );

        SealedSecret::new(metadata, encrypted_data, secret.type_.clone()).to_yaml()
    }
}
