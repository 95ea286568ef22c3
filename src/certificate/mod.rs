//! # Certificate
//!
//! Acquisition of the sealing controller's public key:
//! - [`CertificateSource`] / [`ClusterCertificateFetcher`] fetch the PEM bundle
//! - [`extract_public_key`] turns the bundle into [`PublicKeyMaterial`]
//!
//! Nothing here is cached. Every reconciliation fetches and parses again so
//! a rotated controller key is always picked up.

mod fetch;
mod key;

pub use fetch::{proxy_path, CertificateSource, ClusterCertificateFetcher};
pub use key::{extract_public_key, CertificateBundle, PublicKeyMaterial};
