//! # kubeseal-provider
//!
//! Turns a declarative secret (name, namespace, type, key/value pairs) into a
//! `SealedSecret` that only the target cluster's sealed-secrets controller
//! can decrypt, and tracks it by the SHA-256 of the sealed text.
//!
//! ## Pipeline
//!
//! 1. [`cluster::ClusterConfigResolver`] turns connection fields, `KUBE_*`
//!    variables and kubeconfig files into one connection descriptor
//! 2. [`certificate::ClusterCertificateFetcher`] GETs `/v1/cert.pem` from the
//!    controller service through the API server proxy
//! 3. [`certificate::extract_public_key`] takes the RSA key of the first certificate
//! 4. [`manifest::CanonicalSecretManifest`] builds the plaintext secret document
//! 5. [`seal::seal_manifest`] checks it and hands it to a [`seal::SealingEngine`]
//! 6. [`reconciler::SealedSecretReconciler`] runs the above and records
//!    [`reconciler::ResourceState`]

pub mod certificate;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod error;
pub mod manifest;
pub mod observability;
pub mod reconciler;
pub mod seal;

pub use error::{ErrorKind, KubesealError, Result};

/// Install the ring crypto provider for rustls
///
/// kube's rustls stack needs a process-wide provider before the first client
/// is built. Safe to call more than once.
pub fn init_rustls() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Already installed by the embedding process
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
