//! # Reconciler
//!
//! Drives the sealing pipeline for one declarative secret and decides when
//! it has to run.
//!
//! ```text
//! Absent --create--> Sealed(id, manifest)
//! Sealed --update(changed)--> Sealed(id', manifest')
//! Sealed --update(unchanged)--> Sealed(id, manifest)
//! Sealed --delete--> Absent
//! ```
//!
//! Change detection is the caller's job. Sealing is randomized, so comparing
//! ciphertexts would report a change on every run.

mod state;

pub use state::{identity, ResourceState, SecretResource};

use crate::certificate::{extract_public_key, CertificateSource, ClusterCertificateFetcher};
use crate::cluster::GuardedConnectionConfig;
use crate::error::Result;
use crate::manifest::CanonicalSecretManifest;
use crate::observability::metrics;
use crate::seal::{seal_manifest, HybridSealer, SealingEngine};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Create/read/update/delete contract for a sealed secret resource
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Run the full pipeline unconditionally
    async fn create(&self, resource: &SecretResource) -> Result<ResourceState>;

    /// Return the recorded state; the cluster is not consulted
    async fn read(&self, resource: &SecretResource, state: &ResourceState)
        -> Result<ResourceState>;

    /// Re-seal when `changed` is set, otherwise keep `prior` as it is
    ///
    /// On failure `prior` is still the recorded state.
    async fn update(
        &self,
        resource: &SecretResource,
        prior: &ResourceState,
        changed: bool,
    ) -> Result<ResourceState>;

    /// Stop tracking the resource; always yields no state
    async fn delete(
        &self,
        resource: &SecretResource,
        state: ResourceState,
    ) -> Result<Option<ResourceState>>;
}

/// [`Reconciler`] over a certificate source and a sealing engine
#[derive(Clone)]
pub struct SealedSecretReconciler {
    source: Arc<dyn CertificateSource>,
    engine: Arc<dyn SealingEngine>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for SealedSecretReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedSecretReconciler")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl SealedSecretReconciler {
    #[must_use]
    pub fn new(source: Arc<dyn CertificateSource>, engine: Arc<dyn SealingEngine>) -> Self {
        Self {
            source,
            engine,
            cancel: CancellationToken::new(),
        }
    }

    /// Fetch from the cluster behind `connection` and seal with [`HybridSealer`]
    #[must_use]
    pub fn for_connection(connection: Arc<GuardedConnectionConfig>) -> Self {
        Self::new(
            Arc::new(ClusterCertificateFetcher::new(connection)),
            Arc::new(HybridSealer::new()),
        )
    }

    /// Tie in-flight certificate fetches to `cancel`
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    async fn seal(&self, resource: &SecretResource) -> Result<ResourceState> {
        let start = Instant::now();
        let result = self.run_pipeline(resource).await;
        metrics::observe_seal_duration(start.elapsed().as_secs_f64());

        match &result {
            Ok(state) => {
                metrics::increment_seals();
                info!(
                    "Sealed secret {}/{} ({} key(s)), id {}",
                    resource.namespace,
                    resource.name,
                    state.keys.len(),
                    state.id
                );
            }
            Err(e) => {
                metrics::increment_seal_errors(e.kind());
                error!(
                    "Failed to seal secret {}/{}: {}",
                    resource.namespace, resource.name, e
                );
            }
        }
        result
    }

    async fn run_pipeline(&self, resource: &SecretResource) -> Result<ResourceState> {
        let spec = resource.spec()?;
        let manifest = CanonicalSecretManifest::build(&spec).render()?;

        let bundle = self
            .source
            .fetch(
                &resource.controller_name,
                &resource.controller_namespace,
                &self.cancel,
            )
            .await?;
        let key = extract_public_key(bundle)?;
        debug!("Using {}-bit controller key", key.bits());

        let sealed = seal_manifest(
            &manifest,
            &key,
            resource.scope,
            resource.allow_empty_data,
            self.engine.as_ref(),
        )?;
        Ok(ResourceState::new(spec.keys(), sealed))
    }
}

#[async_trait]
impl Reconciler for SealedSecretReconciler {
    async fn create(&self, resource: &SecretResource) -> Result<ResourceState> {
        self.seal(resource).await
    }

    async fn read(
        &self,
        _resource: &SecretResource,
        state: &ResourceState,
    ) -> Result<ResourceState> {
        Ok(state.clone())
    }

    async fn update(
        &self,
        resource: &SecretResource,
        prior: &ResourceState,
        changed: bool,
    ) -> Result<ResourceState> {
        if !changed {
            debug!(
                "Secret {}/{} unchanged, keeping id {}",
                resource.namespace, resource.name, prior.id
            );
            return Ok(prior.clone());
        }
        self.seal(resource).await
    }

    async fn delete(
        &self,
        resource: &SecretResource,
        state: ResourceState,
    ) -> Result<Option<ResourceState>> {
        info!(
            "No longer tracking sealed secret {}/{} (id {})",
            resource.namespace, resource.name, state.id
        );
        Ok(None)
    }
}
