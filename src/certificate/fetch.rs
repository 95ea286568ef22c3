//! # Certificate Fetch
//!
//! Proxied GET of the sealing controller's certificate endpoint through the
//! API server's service-proxy subresource. No retries; the caller owns
//! retry policy.

use super::CertificateBundle;
use crate::cluster::GuardedConnectionConfig;
use crate::constants::{CERT_ACCEPT, CERT_ENDPOINT_PATH, CONTROLLER_PROXY_SCHEME};
use crate::error::{KubesealError, Result};
use crate::observability::metrics;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Source of the sealing controller certificate
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Fetch the PEM bundle served by `controller_namespace/controller_name`
    ///
    /// The fetch runs under a child of `cancel`; cancelling the parent aborts
    /// an in-flight request.
    async fn fetch(
        &self,
        controller_name: &str,
        controller_namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<CertificateBundle>;
}

/// Service-proxy path for the certificate endpoint of a controller service
#[must_use]
pub fn proxy_path(controller_name: &str, controller_namespace: &str) -> String {
    format!(
        "/api/v1/namespaces/{controller_namespace}/services/{CONTROLLER_PROXY_SCHEME}:{controller_name}:/proxy{CERT_ENDPOINT_PATH}"
    )
}

/// Fetches the certificate from the cluster the connection points at
#[derive(Debug, Clone)]
pub struct ClusterCertificateFetcher {
    connection: Arc<GuardedConnectionConfig>,
}

impl ClusterCertificateFetcher {
    #[must_use]
    pub fn new(connection: Arc<GuardedConnectionConfig>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl CertificateSource for ClusterCertificateFetcher {
    async fn fetch(
        &self,
        controller_name: &str,
        controller_namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<CertificateBundle> {
        let start = Instant::now();
        metrics::increment_certificate_fetches();

        let result = fetch_certificate(
            &self.connection,
            controller_name,
            controller_namespace,
            cancel,
        )
        .await;

        metrics::observe_certificate_fetch_duration(start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            metrics::increment_certificate_fetch_errors();
            warn!("Certificate fetch failed: {}", e);
        }
        result
    }
}

async fn fetch_certificate(
    connection: &GuardedConnectionConfig,
    controller_name: &str,
    controller_namespace: &str,
    cancel: &CancellationToken,
) -> Result<CertificateBundle> {
    let connection_error = |message: String| KubesealError::Connection {
        name: controller_name.to_string(),
        namespace: controller_namespace.to_string(),
        message,
    };
    let certificate_error = |message: String| KubesealError::Certificate {
        name: controller_name.to_string(),
        namespace: controller_namespace.to_string(),
        message,
    };

    let client = connection
        .client()
        .await
        .map_err(|e| connection_error(format!("cannot build client: {e}")))?;

    let path = proxy_path(controller_name, controller_namespace);
    let request = http::Request::get(path.as_str())
        .header(http::header::ACCEPT, CERT_ACCEPT)
        .body(Vec::new())
        .map_err(|e| connection_error(format!("invalid request {path}: {e}")))?;

    info!(
        "Fetching sealing certificate from {}/{}",
        controller_namespace, controller_name
    );

    // Cancelled when this function returns, whatever the outcome
    let token = cancel.child_token();
    let _release = token.clone().drop_guard();

    let response = tokio::select! {
        biased;
        () = token.cancelled() => {
            return Err(connection_error("certificate fetch cancelled".to_string()));
        }
        response = client.request_text(request) => response,
    };

    let body = match response {
        Ok(body) => body,
        // Rejected credentials are a connection failure
        Err(kube::Error::Api(api_err)) if api_err.code == 401 || api_err.code == 403 => {
            return Err(connection_error(format!(
                "access denied ({}): {}",
                api_err.code, api_err.message
            )));
        }
        Err(err @ kube::Error::Api(..)) => return Err(certificate_error(err.to_string())),
        Err(err) => return Err(connection_error(err.to_string())),
    };

    let bundle = CertificateBundle::from(body);
    if bundle.is_empty() {
        return Err(certificate_error("empty certificate response".to_string()));
    }

    debug!("Fetched {} bytes of certificate data", bundle.as_bytes().len());
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_path_targets_service_proxy() {
        assert_eq!(
            proxy_path("sealed-secrets-controller", "kube-system"),
            "/api/v1/namespaces/kube-system/services/http:sealed-secrets-controller:/proxy/v1/cert.pem"
        );
    }
}
