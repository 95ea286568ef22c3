//! Common test utilities for the integration tests
//!
//! Provides rustls setup, the pact mock server plumbing shared by the
//! certificate and end-to-end tests, and kubeconfig files pointing at it.

#![allow(dead_code)]

use std::io::Write;
use std::sync::Once;
use tempfile::NamedTempFile;

static RUSTLS_INIT: Once = Once::new();

pub const CONTROLLER_NAME: &str = "sealed-secrets-controller";
pub const CONTROLLER_NAMESPACE: &str = "kube-system";
pub const CERT_PEM: &str = include_str!("../fixtures/sealed-secrets-cert.pem");
pub const TEST_TOKEN: &str = "test-token";

/// Initialize rustls crypto provider for tests
///
/// Must run before the first kube client is built.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        kubeseal_provider::init_rustls();
    });
}

/// Service-proxy path of the default test controller
pub fn cert_path() -> String {
    kubeseal_provider::certificate::proxy_path(CONTROLLER_NAME, CONTROLLER_NAMESPACE)
}

/// Mock server base URL without the trailing slash
pub fn base_url(url: impl std::fmt::Display) -> String {
    let mut base = url.to_string();
    if base.ends_with('/') {
        base.pop();
    }
    base
}

/// Kubeconfig with a single token-authenticated context for `server`
pub fn kubeconfig_for(server: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create kubeconfig file");
    write!(
        file,
        r"apiVersion: v1
kind: Config
clusters:
  - name: mock
    cluster:
      server: {server}
contexts:
  - name: mock
    context:
      cluster: mock
      user: tester
current-context: mock
users:
  - name: tester
    user:
      token: {TEST_TOKEN}
"
    )
    .expect("Failed to write kubeconfig file");
    file
}
