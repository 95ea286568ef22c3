//! # Kubernetes Connection Fields
//!
//! The declarative `kubernetes` block: explicit overrides, kubeconfig
//! selection and the exec credential plugin. Unset fields can be filled from
//! `KUBE_*` environment variables before resolution.

use crate::constants::*;
use crate::error::{KubesealError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Connection fields as written by the user
///
/// Empty strings are treated the same as absent values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct KubernetesFields {
    /// Hostname (in form of URI) of the API server
    pub host: Option<String>,
    /// Username for HTTP basic authentication
    pub username: Option<String>,
    /// Password for HTTP basic authentication
    pub password: Option<String>,
    /// Skip TLS verification of the API server
    pub insecure: Option<bool>,
    /// PEM-encoded client certificate for TLS authentication
    pub client_certificate: Option<String>,
    /// PEM-encoded client certificate key for TLS authentication
    pub client_key: Option<String>,
    /// PEM-encoded root certificates bundle
    pub cluster_ca_certificate: Option<String>,
    /// Path to a single kubeconfig file (conflicts with `config_paths`)
    pub config_path: Option<String>,
    /// Paths to kubeconfig files, merged in order (first wins)
    pub config_paths: Option<Vec<String>>,
    pub config_context: Option<String>,
    pub config_context_auth_info: Option<String>,
    pub config_context_cluster: Option<String>,
    /// Bearer token (e.g. a service account token)
    pub token: Option<String>,
    /// Exec credential plugin, list form with exactly one element
    pub exec: Option<Vec<ExecFields>>,
    /// Namespace for the resolved connection, `default` when unset
    pub namespace: Option<String>,
}

/// Exec credential plugin block
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecFields {
    pub api_version: Option<String>,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// Return the value only when it holds something
pub(crate) fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

impl KubernetesFields {
    /// Fill unset fields from the process environment
    #[must_use]
    pub fn with_env_defaults(self) -> Self {
        self.with_env_defaults_from(|key| std::env::var(key).ok())
    }

    /// Fill unset fields from `lookup`
    ///
    /// `KUBE_CONFIG_PATH` only applies when `config_paths` is also unset, so an
    /// ambient single path never shadows an explicit list.
    #[must_use]
    pub fn with_env_defaults_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.is_empty());

        fill(&mut self.host, || env(KUBE_HOST_ENV));
        fill(&mut self.username, || env(KUBE_USER_ENV));
        fill(&mut self.password, || env(KUBE_PASSWORD_ENV));
        fill(&mut self.client_certificate, || env(KUBE_CLIENT_CERT_DATA_ENV));
        fill(&mut self.client_key, || env(KUBE_CLIENT_KEY_DATA_ENV));
        fill(&mut self.cluster_ca_certificate, || {
            env(KUBE_CLUSTER_CA_CERT_DATA_ENV)
        });
        fill(&mut self.config_context, || env(KUBE_CTX_ENV));
        fill(&mut self.config_context_auth_info, || {
            env(KUBE_CTX_AUTH_INFO_ENV)
        });
        fill(&mut self.config_context_cluster, || env(KUBE_CTX_CLUSTER_ENV));
        fill(&mut self.token, || env(KUBE_TOKEN_ENV));

        if self.config_paths.is_none() {
            fill(&mut self.config_path, || env(KUBE_CONFIG_PATH_ENV));
        }

        if self.insecure.is_none() {
            if let Some(raw) = env(KUBE_INSECURE_ENV) {
                match parse_bool(&raw) {
                    Some(value) => self.insecure = Some(value),
                    None => warn!("Ignoring {} with non-boolean value", KUBE_INSECURE_ENV),
                }
            }
        }

        self
    }

    /// Reject field combinations the resolver cannot honor
    ///
    /// # Errors
    ///
    /// Returns a configuration error when both `config_path` and
    /// `config_paths` are set, or when the exec block is malformed.
    pub fn validate(&self) -> Result<()> {
        let has_paths = self
            .config_paths
            .as_ref()
            .is_some_and(|paths| !paths.is_empty());
        if non_empty(self.config_path.as_ref()).is_some() && has_paths {
            return Err(KubesealError::config(
                "config_path and config_paths are mutually exclusive",
            ));
        }
        if let Some(exec) = &self.exec {
            single_exec(exec)?;
        }
        Ok(())
    }
}

/// The one element of an exec list, with its required sub-fields present
pub(crate) fn single_exec(exec: &[ExecFields]) -> Result<(&ExecFields, &str, &str)> {
    let [spec] = exec else {
        return Err(KubesealError::config(format!(
            "failed to parse exec: expected exactly one block, found {}",
            exec.len()
        )));
    };
    let api_version = non_empty(spec.api_version.as_ref())
        .ok_or_else(|| KubesealError::config("failed to parse exec: api_version is required"))?;
    let command = non_empty(spec.command.as_ref())
        .ok_or_else(|| KubesealError::config("failed to parse exec: command is required"))?;
    Ok((spec, api_version, command))
}

fn fill<F>(slot: &mut Option<String>, default: F)
where
    F: FnOnce() -> Option<String>,
{
    if non_empty(slot.as_ref()).is_none() {
        if let Some(value) = default() {
            *slot = Some(value);
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
