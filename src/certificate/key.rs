//! # Key Extraction
//!
//! Parses the PEM bundle served by the controller and pulls the RSA public
//! key out of the first certificate. Only structure is checked; chain and
//! expiry are not validated.

use crate::error::{KubesealError, Result};
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

/// Raw PEM bytes fetched from the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateBundle(Vec<u8>);

impl CertificateBundle {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(u8::is_ascii_whitespace)
    }
}

impl From<String> for CertificateBundle {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

/// Public key of the sealing controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyMaterial(RsaPublicKey);

impl PublicKeyMaterial {
    #[must_use]
    pub fn rsa(&self) -> &RsaPublicKey {
        &self.0
    }

    /// Modulus size in bits
    #[must_use]
    pub fn bits(&self) -> usize {
        self.0.size() * 8
    }
}

impl From<RsaPublicKey> for PublicKeyMaterial {
    fn from(key: RsaPublicKey) -> Self {
        Self(key)
    }
}

/// Public key of the first certificate in `bundle`
///
/// Consumes the bundle; the raw bytes are not needed past this point.
///
/// # Errors
///
/// Returns a key-parse error when no certificate can be parsed or when the
/// first certificate does not carry an RSA key. The error names the key type
/// that was found.
pub fn extract_public_key(bundle: CertificateBundle) -> Result<PublicKeyMaterial> {
    let blocks = ::pem::parse_many(bundle.as_bytes())
        .map_err(|e| KubesealError::KeyParse(format!("invalid PEM data: {e}")))?;

    let Some(first) = blocks.iter().find(|block| block.tag() == "CERTIFICATE") else {
        return Err(KubesealError::KeyParse(
            "no certificates found".to_string(),
        ));
    };

    let (_, certificate) = X509Certificate::from_der(first.contents())
        .map_err(|e| KubesealError::KeyParse(format!("invalid certificate: {e}")))?;
    let spki = certificate.public_key();

    match spki.parsed() {
        Ok(PublicKey::RSA(_)) => {}
        Ok(other) => {
            return Err(KubesealError::KeyParse(format!(
                "expected RSA public key but found {}",
                key_type_name(&other)
            )))
        }
        Err(e) => {
            return Err(KubesealError::KeyParse(format!(
                "expected RSA public key but found unparseable key ({}): {e}",
                spki.algorithm.algorithm
            )))
        }
    }

    RsaPublicKey::from_public_key_der(spki.raw)
        .map(PublicKeyMaterial)
        .map_err(|e| KubesealError::KeyParse(format!("invalid RSA public key: {e}")))
}

fn key_type_name(key: &PublicKey<'_>) -> String {
    match key {
        PublicKey::RSA(_) => "RSA".to_string(),
        PublicKey::EC(_) => "EC".to_string(),
        PublicKey::DSA(_) => "DSA".to_string(),
        PublicKey::GostR3410(_) => "GOST R 34.10-2001".to_string(),
        PublicKey::GostR3410_2012(_) => "GOST R 34.10-2012".to_string(),
        PublicKey::Unknown(_) => "unknown key type".to_string(),
    }
}
