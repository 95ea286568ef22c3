//! # Constants
//!
//! Shared constants used throughout the provider.
//!
//! These values represent the sealed-secrets controller conventions and the
//! environment variables the connection layer reads.

/// Namespace used for the resolved connection when none is given
pub const DEFAULT_NAMESPACE: &str = "default";

/// Path of the public certificate endpoint served by the sealing controller
pub const CERT_ENDPOINT_PATH: &str = "/v1/cert.pem";

/// Accept header for the certificate fetch (PEM first, anything as a fallback)
pub const CERT_ACCEPT: &str = "application/x-pem-file, */*";

/// Scheme used when proxying to the controller service
pub const CONTROLLER_PROXY_SCHEME: &str = "http";

/// Environment variable holding a platform-separated list of kubeconfig paths
pub const KUBE_CONFIG_PATHS_ENV: &str = "KUBE_CONFIG_PATHS";

/// Standard kubeconfig search list used by default discovery
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Environment defaults for the connection fields
pub const KUBE_HOST_ENV: &str = "KUBE_HOST";
pub const KUBE_USER_ENV: &str = "KUBE_USER";
pub const KUBE_PASSWORD_ENV: &str = "KUBE_PASSWORD";
pub const KUBE_INSECURE_ENV: &str = "KUBE_INSECURE";
pub const KUBE_CLIENT_CERT_DATA_ENV: &str = "KUBE_CLIENT_CERT_DATA";
pub const KUBE_CLIENT_KEY_DATA_ENV: &str = "KUBE_CLIENT_KEY_DATA";
pub const KUBE_CLUSTER_CA_CERT_DATA_ENV: &str = "KUBE_CLUSTER_CA_CERT_DATA";
pub const KUBE_CONFIG_PATH_ENV: &str = "KUBE_CONFIG_PATH";
pub const KUBE_CTX_ENV: &str = "KUBE_CTX";
pub const KUBE_CTX_AUTH_INFO_ENV: &str = "KUBE_CTX_AUTH_INFO";
pub const KUBE_CTX_CLUSTER_ENV: &str = "KUBE_CTX_CLUSTER";
pub const KUBE_TOKEN_ENV: &str = "KUBE_TOKEN";

/// Plaintext secret document
pub const SECRET_API_VERSION: &str = "v1";
pub const SECRET_KIND: &str = "Secret";
pub const SECRET_TYPE_OPAQUE: &str = "Opaque";

/// Sealed output document
pub const SEALED_SECRET_API_VERSION: &str = "bitnami.com/v1alpha1";
pub const SEALED_SECRET_KIND: &str = "SealedSecret";

/// Scope annotations understood by the sealing controller
pub const NAMESPACE_WIDE_ANNOTATION: &str = "sealedsecrets.bitnami.com/namespace-wide";
pub const CLUSTER_WIDE_ANNOTATION: &str = "sealedsecrets.bitnami.com/cluster-wide";

/// Size of the per-key AES-256-GCM session key (bytes)
pub const SESSION_KEY_BYTES: usize = 32;
