//! # Cluster Connection
//!
//! Resolves the declarative connection fields into a single
//! [`ClusterConnectionConfig`] and hands out a lazily built client for it.
//!
//! ## Resolution Flow
//!
//! 1. Pick candidate kubeconfig paths (`config_path` > `config_paths` > `KUBE_CONFIG_PATHS`)
//! 2. Expand `~` in each path
//! 3. Load the files (one path: exclusive source; several: merged, first wins)
//!    or fall back to kube's default discovery
//! 4. Apply context selectors that are explicitly set
//! 5. Layer static overrides (host, TLS material, credentials, exec plugin)
//! 6. Pin the namespace (`default` unless overridden)

mod overrides;
mod paths;

pub use overrides::{default_server_url, exec_config};
pub use paths::{candidate_paths, expand_home, expand_paths};

use crate::config::{non_empty, single_exec, KubernetesFields};
use crate::constants::{DEFAULT_NAMESPACE, KUBECONFIG_ENV, KUBE_CONFIG_PATHS_ENV};
use crate::error::{KubesealError, Result};
use kube::config::{AuthInfo, KubeConfigOptions, Kubeconfig};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// How the resolved connection authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Exec,
    Token,
    Certificate,
    Basic,
    /// Auth provider plugin or no credentials at all
    None,
}

impl AuthMode {
    fn of(auth: &AuthInfo) -> Self {
        if auth.exec.is_some() {
            AuthMode::Exec
        } else if auth.token.is_some() || auth.token_file.is_some() {
            AuthMode::Token
        } else if auth.client_certificate_data.is_some() || auth.client_certificate.is_some() {
            AuthMode::Certificate
        } else if auth.username.is_some() && auth.password.is_some() {
            AuthMode::Basic
        } else {
            AuthMode::None
        }
    }
}

/// Context selectors taken from the connection fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSelection {
    pub current_context: Option<String>,
    pub auth_info: Option<String>,
    pub cluster: Option<String>,
}

impl ContextSelection {
    fn from_fields(fields: &KubernetesFields) -> Self {
        let owned = |v: Option<&String>| non_empty(v).map(str::to_string);
        Self {
            current_context: owned(fields.config_context.as_ref()),
            auth_info: owned(fields.config_context_auth_info.as_ref()),
            cluster: owned(fields.config_context_cluster.as_ref()),
        }
    }

    fn is_set(&self) -> bool {
        self.current_context.is_some() || self.auth_info.is_some() || self.cluster.is_some()
    }

    fn options(&self) -> KubeConfigOptions {
        KubeConfigOptions {
            context: self.current_context.clone(),
            cluster: self.cluster.clone(),
            user: self.auth_info.clone(),
        }
    }
}

/// Fully resolved, immutable connection descriptor
#[derive(Debug, Clone)]
pub struct ClusterConnectionConfig {
    kube: kube::Config,
    auth_mode: AuthMode,
    context: ContextSelection,
    config_paths: Vec<PathBuf>,
}

impl ClusterConnectionConfig {
    /// Descriptor for an already built kube config (no files involved)
    #[must_use]
    pub fn from_kube_config(kube: kube::Config) -> Self {
        let auth_mode = AuthMode::of(&kube.auth_info);
        Self {
            kube,
            auth_mode,
            context: ContextSelection::default(),
            config_paths: Vec::new(),
        }
    }

    #[must_use]
    pub fn cluster_url(&self) -> &http::Uri {
        &self.kube.cluster_url
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.kube.default_namespace
    }

    #[must_use]
    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    #[must_use]
    pub fn insecure(&self) -> bool {
        self.kube.accept_invalid_certs
    }

    #[must_use]
    pub fn context(&self) -> &ContextSelection {
        &self.context
    }

    /// Kubeconfig files that were consulted, in precedence order
    #[must_use]
    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    #[must_use]
    pub fn kube_config(&self) -> &kube::Config {
        &self.kube
    }
}

/// Connection descriptor shared across concurrent reconciliations
///
/// The descriptor itself is read-only. The lock only covers construction of
/// the client; once built, clones of it are handed out and requests run
/// concurrently.
pub struct GuardedConnectionConfig {
    config: ClusterConnectionConfig,
    client: Mutex<Option<kube::Client>>,
}

impl std::fmt::Debug for GuardedConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedConnectionConfig")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GuardedConnectionConfig {
    #[must_use]
    pub fn new(config: ClusterConnectionConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClusterConnectionConfig {
        &self.config
    }

    /// Client for the cluster, built on first use
    ///
    /// # Errors
    ///
    /// Propagates kube's error when TLS material or credentials cannot be
    /// turned into a client. A failed build is not cached.
    pub async fn client(&self) -> Result<kube::Client, kube::Error> {
        crate::init_rustls();
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = kube::Client::try_from(self.config.kube.clone())?;
        *slot = Some(client.clone());
        debug!("Built Kubernetes client for {}", self.config.cluster_url());
        Ok(client)
    }
}

/// Merges explicit fields, environment and kubeconfig files
#[derive(Debug, Clone)]
pub struct ClusterConfigResolver {
    env_config_paths: Option<OsString>,
    default_kubeconfig: Option<OsString>,
    default_discovery: bool,
}

impl ClusterConfigResolver {
    /// Resolver reading `KUBE_CONFIG_PATHS` from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_env_config_paths(std::env::var_os(KUBE_CONFIG_PATHS_ENV))
    }

    /// Resolver with an explicit `KUBE_CONFIG_PATHS` value
    ///
    /// Default discovery still reads `KUBECONFIG` from the process environment.
    #[must_use]
    pub fn with_env_config_paths(value: Option<OsString>) -> Self {
        Self {
            env_config_paths: value,
            default_kubeconfig: std::env::var_os(KUBECONFIG_ENV),
            default_discovery: true,
        }
    }

    /// Use `value` in place of `KUBECONFIG` for default discovery
    #[must_use]
    pub fn with_default_kubeconfig(mut self, value: Option<OsString>) -> Self {
        self.default_kubeconfig = value;
        self
    }

    /// Do not fall back to `KUBECONFIG` or `~/.kube/config` when no path is given
    #[must_use]
    pub fn without_default_discovery(mut self) -> Self {
        self.default_discovery = false;
        self
    }

    /// Candidate kubeconfig paths after home expansion
    ///
    /// # Errors
    ///
    /// Propagates path-expansion failures.
    pub fn config_paths(&self, fields: &KubernetesFields) -> Result<Vec<PathBuf>> {
        let candidates = candidate_paths(fields, self.env_config_paths.as_deref());
        expand_paths(&candidates)
    }

    /// Resolve `fields` into a connection descriptor
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a malformed exec block, a path that
    /// cannot be expanded or read, a kubeconfig that does not yield a usable
    /// context, an invalid host, or when no configuration source exists at all.
    pub async fn resolve(&self, fields: &KubernetesFields) -> Result<ClusterConnectionConfig> {
        if let Some(exec) = &fields.exec {
            single_exec(exec)?;
        }

        let config_paths = self.config_paths(fields)?;
        let context = ContextSelection::from_fields(fields);
        let kubeconfig = if config_paths.is_empty() && self.default_discovery {
            discover_kubeconfig(self.default_kubeconfig.as_deref())?
        } else {
            load_kubeconfig(&config_paths)?
        };

        let mut kube = match kubeconfig {
            Some(kubeconfig) => {
                let options = if context.is_set() {
                    debug!("Using custom context selection: {:?}", context);
                    context.options()
                } else {
                    KubeConfigOptions::default()
                };
                kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| {
                        KubesealError::config(format!("failed to load kubeconfig: {e}"))
                    })?
            }
            None => {
                let host = non_empty(fields.host.as_ref()).ok_or_else(|| {
                    KubesealError::config(
                        "no configuration has been provided, set host or a kubeconfig path",
                    )
                })?;
                // Real URL is computed by the overrides below
                kube::Config::new(default_server_url(host, false)?)
            }
        };

        overrides::apply_overrides(&mut kube, fields)?;

        kube.default_namespace = non_empty(fields.namespace.as_ref())
            .unwrap_or(DEFAULT_NAMESPACE)
            .to_string();

        let auth_mode = AuthMode::of(&kube.auth_info);
        info!(
            "Resolved Kubernetes connection to {} (auth: {:?}, namespace: {})",
            kube.cluster_url, auth_mode, kube.default_namespace
        );

        Ok(ClusterConnectionConfig {
            kube,
            auth_mode,
            context,
            config_paths,
        })
    }
}

/// Load the kubeconfig for `paths`
///
/// A single path is the exclusive source and must exist. Several paths are
/// merged in order (first file wins on conflict) and missing files among
/// them are skipped.
fn load_kubeconfig(paths: &[PathBuf]) -> Result<Option<Kubeconfig>> {
    match paths {
        [] => Ok(None),
        [path] => read_kubeconfig(path).map(Some),
        _ => merge_kubeconfigs(paths),
    }
}

/// Default discovery: the `KUBECONFIG` list, else `~/.kube/config`
///
/// Only the absence of any file counts as "nothing found". A file that
/// exists but cannot be read or parsed is a configuration error.
fn discover_kubeconfig(kubeconfig_env: Option<&OsStr>) -> Result<Option<Kubeconfig>> {
    if let Some(value) = kubeconfig_env.filter(|value| !value.is_empty()) {
        let paths: Vec<PathBuf> = std::env::split_paths(value)
            .filter(|path| !path.as_os_str().is_empty())
            .collect();
        debug!("Using kubeconfig from {}: {:?}", KUBECONFIG_ENV, paths);
        return merge_kubeconfigs(&paths);
    }

    let Some(path) = dirs::home_dir().map(|home| home.join(".kube").join("config")) else {
        debug!("No home directory, skipping default kubeconfig");
        return Ok(None);
    };
    if !path.exists() {
        debug!("No kubeconfig found at {}", path.display());
        return Ok(None);
    }
    debug!("Using default kubeconfig {}", path.display());
    read_kubeconfig(&path).map(Some)
}

fn merge_kubeconfigs(paths: &[PathBuf]) -> Result<Option<Kubeconfig>> {
    let mut merged: Option<Kubeconfig> = None;
    for path in paths {
        if !path.exists() {
            debug!("Skipping missing kubeconfig {}", path.display());
            continue;
        }
        let next = read_kubeconfig(path)?;
        merged = Some(match merged {
            Some(current) => current
                .merge(next)
                .map_err(|e| KubesealError::config(format!("failed to merge kubeconfig: {e}")))?,
            None => next,
        });
    }
    Ok(merged)
}

fn read_kubeconfig(path: &Path) -> Result<Kubeconfig> {
    Kubeconfig::read_from(path).map_err(|e| {
        KubesealError::config(format!(
            "failed to read kubeconfig {}: {e}",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    fn kubeconfig(context: &str, server: &str, namespace: &str) -> String {
        format!(
            r"apiVersion: v1
kind: Config
current-context: {context}
clusters:
  - name: {context}-cluster
    cluster:
      server: {server}
contexts:
  - name: {context}
    context:
      cluster: {context}-cluster
      user: {context}-user
      namespace: {namespace}
users:
  - name: {context}-user
    user:
      token: {context}-token
"
        )
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn resolver() -> ClusterConfigResolver {
        ClusterConfigResolver::with_env_config_paths(None).without_default_discovery()
    }

    #[tokio::test]
    async fn test_single_path_is_exclusive_source() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_file(&dir, "first", &kubeconfig("alpha", "https://alpha:6443", "a"));
        let second = write_file(&dir, "second", &kubeconfig("beta", "https://beta:6443", "b"));
        let fields = KubernetesFields {
            config_path: Some(first.display().to_string()),
            config_paths: Some(vec![second.display().to_string()]),
            ..Default::default()
        };

        let config = resolver().resolve(&fields).await.unwrap();
        assert_eq!(config.cluster_url().host(), Some("alpha"));
        assert_eq!(config.config_paths(), &[first]);
        assert_eq!(config.auth_mode(), AuthMode::Token);
    }

    #[tokio::test]
    async fn test_multiple_paths_merge_first_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_file(&dir, "first", &kubeconfig("alpha", "https://alpha:6443", "a"));
        let second = write_file(&dir, "second", &kubeconfig("beta", "https://beta:6443", "b"));
        let fields = KubernetesFields {
            config_paths: Some(vec![
                first.display().to_string(),
                second.display().to_string(),
            ]),
            ..Default::default()
        };

        let config = resolver().resolve(&fields).await.unwrap();
        assert_eq!(config.cluster_url().host(), Some("alpha"));

        // Selecting the second file's context still works after the merge
        let fields = KubernetesFields {
            config_context: Some("beta".to_string()),
            ..fields
        };
        let config = resolver().resolve(&fields).await.unwrap();
        assert_eq!(config.cluster_url().host(), Some("beta"));
    }

    fn token_of(config: &ClusterConnectionConfig) -> Option<String> {
        config
            .kube_config()
            .auth_info
            .token
            .as_ref()
            .map(|t| t.expose_secret().to_string())
    }

    #[tokio::test]
    async fn test_auth_info_selector_keeps_current_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_file(&dir, "first", &kubeconfig("alpha", "https://alpha:6443", "a"));
        let second = write_file(&dir, "second", &kubeconfig("beta", "https://beta:6443", "b"));
        let fields = KubernetesFields {
            config_paths: Some(vec![
                first.display().to_string(),
                second.display().to_string(),
            ]),
            config_context_auth_info: Some("beta-user".to_string()),
            ..Default::default()
        };

        let config = resolver().resolve(&fields).await.unwrap();
        assert_eq!(config.cluster_url().host(), Some("alpha"));
        assert_eq!(token_of(&config).as_deref(), Some("beta-token"));
        assert_eq!(config.context().current_context, None);
        assert_eq!(config.context().auth_info.as_deref(), Some("beta-user"));
    }

    #[tokio::test]
    async fn test_cluster_selector_keeps_current_user() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_file(&dir, "first", &kubeconfig("alpha", "https://alpha:6443", "a"));
        let second = write_file(&dir, "second", &kubeconfig("beta", "https://beta:6443", "b"));
        let fields = KubernetesFields {
            config_paths: Some(vec![
                first.display().to_string(),
                second.display().to_string(),
            ]),
            config_context_cluster: Some("beta-cluster".to_string()),
            ..Default::default()
        };

        let config = resolver().resolve(&fields).await.unwrap();
        assert_eq!(config.cluster_url().host(), Some("beta"));
        assert_eq!(token_of(&config).as_deref(), Some("alpha-token"));
        assert_eq!(config.context().cluster.as_deref(), Some("beta-cluster"));
    }

    #[tokio::test]
    async fn test_env_paths_used_without_explicit_fields() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_file(&dir, "first", &kubeconfig("alpha", "https://alpha:6443", "a"));
        let missing = dir.path().join("missing");
        let env = std::env::join_paths([&missing, &first]).unwrap();

        let resolver = ClusterConfigResolver::with_env_config_paths(Some(env));
        let paths = resolver.config_paths(&KubernetesFields::default()).unwrap();
        assert_eq!(paths.len(), 2);

        let config = resolver.resolve(&KubernetesFields::default()).await.unwrap();
        assert_eq!(config.cluster_url().host(), Some("alpha"));
    }

    #[tokio::test]
    async fn test_namespace_defaults_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "config", &kubeconfig("alpha", "https://alpha:6443", "a"));
        let fields = KubernetesFields {
            config_path: Some(path.display().to_string()),
            ..Default::default()
        };
        let config = resolver().resolve(&fields).await.unwrap();
        assert_eq!(config.namespace(), "default");

        let fields = KubernetesFields {
            namespace: Some("sealing".to_string()),
            ..fields
        };
        let config = resolver().resolve(&fields).await.unwrap();
        assert_eq!(config.namespace(), "sealing");
    }

    #[tokio::test]
    async fn test_host_override_beats_kubeconfig_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "config", &kubeconfig("alpha", "https://alpha:6443", "a"));
        let fields = KubernetesFields {
            config_path: Some(path.display().to_string()),
            host: Some("override.example:443".to_string()),
            insecure: Some(true),
            ..Default::default()
        };
        let config = resolver().resolve(&fields).await.unwrap();
        assert_eq!(config.cluster_url().host(), Some("override.example"));
        assert_eq!(config.cluster_url().scheme_str(), Some("https"));
        assert!(config.insecure());
    }

    #[tokio::test]
    async fn test_host_only_configuration() {
        let fields = KubernetesFields {
            host: Some("127.0.0.1:8001".to_string()),
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        let config = resolver().resolve(&fields).await.unwrap();
        assert_eq!(config.cluster_url().scheme_str(), Some("http"));
        assert_eq!(config.cluster_url().port_u16(), Some(8001));
        assert_eq!(config.auth_mode(), AuthMode::Basic);
        assert!(config.config_paths().is_empty());
    }

    #[tokio::test]
    async fn test_no_source_is_configuration_error() {
        let err = resolver()
            .resolve(&KubernetesFields::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no configuration has been provided"));
    }

    #[tokio::test]
    async fn test_malformed_default_kubeconfig_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "config", "clusters: [this is: not: valid");
        let resolver = ClusterConfigResolver::with_env_config_paths(None)
            .with_default_kubeconfig(Some(path.into_os_string()));
        let fields = KubernetesFields {
            host: Some("127.0.0.1:8001".to_string()),
            ..Default::default()
        };

        let err = resolver.resolve(&fields).await.unwrap_err();
        assert!(matches!(err, KubesealError::Configuration(_)), "{err:?}");
        assert!(err.to_string().contains("failed to read kubeconfig"));
    }

    #[tokio::test]
    async fn test_default_kubeconfig_is_used_without_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "config", &kubeconfig("alpha", "https://alpha:6443", "a"));
        let resolver = ClusterConfigResolver::with_env_config_paths(None)
            .with_default_kubeconfig(Some(path.into_os_string()));

        let config = resolver.resolve(&KubernetesFields::default()).await.unwrap();
        assert_eq!(config.cluster_url().host(), Some("alpha"));
        assert!(config.config_paths().is_empty());
    }

    #[tokio::test]
    async fn test_missing_default_kubeconfig_falls_back_to_host() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ClusterConfigResolver::with_env_config_paths(None)
            .with_default_kubeconfig(Some(dir.path().join("absent").into_os_string()));
        let fields = KubernetesFields {
            host: Some("127.0.0.1:8001".to_string()),
            ..Default::default()
        };

        let config = resolver.resolve(&fields).await.unwrap();
        assert_eq!(config.cluster_url().port_u16(), Some(8001));
    }

    #[tokio::test]
    async fn test_single_missing_env_path_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let env = std::env::join_paths([dir.path().join("absent")]).unwrap();
        let resolver = ClusterConfigResolver::with_env_config_paths(Some(env));
        let fields = KubernetesFields {
            host: Some("127.0.0.1:8001".to_string()),
            ..Default::default()
        };
        let err = resolver.resolve(&fields).await.unwrap_err();
        assert!(matches!(err, KubesealError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_missing_single_path_is_configuration_error() {
        let fields = KubernetesFields {
            config_path: Some("/definitely/not/here/kubeconfig".to_string()),
            ..Default::default()
        };
        let err = resolver().resolve(&fields).await.unwrap_err();
        assert!(matches!(err, KubesealError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_exec_without_command_fails_before_loading() {
        let fields = KubernetesFields {
            config_path: Some("/definitely/not/here/kubeconfig".to_string()),
            exec: Some(vec![crate::config::ExecFields {
                api_version: Some("client.authentication.k8s.io/v1beta1".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let err = resolver().resolve(&fields).await.unwrap_err();
        assert!(err.to_string().contains("command is required"));
    }

    #[tokio::test]
    async fn test_guarded_client_is_built_once() {
        let config = ClusterConnectionConfig::from_kube_config(kube::Config::new(
            "http://127.0.0.1:1".parse().unwrap(),
        ));
        let guarded = GuardedConnectionConfig::new(config);
        guarded.client().await.unwrap();
        guarded.client().await.unwrap();
        assert!(guarded.client.lock().await.is_some());
        assert_eq!(guarded.config().auth_mode(), AuthMode::None);
    }
}
