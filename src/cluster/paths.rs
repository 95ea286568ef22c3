//! # Kubeconfig Path Discovery
//!
//! Picks the candidate kubeconfig files and expands `~` in each of them.
//!
//! Precedence, highest first:
//! 1. `config_path` (single explicit path)
//! 2. `config_paths` (explicit list)
//! 3. `KUBE_CONFIG_PATHS` (platform-separated list)

use crate::config::{non_empty, KubernetesFields};
use crate::error::{KubesealError, Result};
use std::ffi::OsStr;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Candidate kubeconfig paths before home expansion
pub fn candidate_paths(fields: &KubernetesFields, env_paths: Option<&OsStr>) -> Vec<String> {
    let explicit_list = fields
        .config_paths
        .as_ref()
        .filter(|paths| !paths.is_empty());

    if let Some(path) = non_empty(fields.config_path.as_ref()) {
        if explicit_list.is_some() {
            warn!("Both config_path and config_paths are set, using config_path only");
        }
        return vec![path.to_string()];
    }

    if let Some(paths) = explicit_list {
        return paths.clone();
    }

    match env_paths.filter(|v| !v.is_empty()) {
        Some(raw) => std::env::split_paths(raw)
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_string_lossy().into_owned())
            .collect(),
        None => Vec::new(),
    }
}

/// Expand every candidate, failing on the first path that cannot be expanded
///
/// # Errors
///
/// Returns a configuration error if a path names another user's home
/// directory or if the current home directory is unknown.
pub fn expand_paths(paths: &[String]) -> Result<Vec<PathBuf>> {
    paths
        .iter()
        .map(|p| {
            let expanded = expand_home(p)?;
            debug!("Using kubeconfig: {}", expanded.display());
            Ok(expanded)
        })
        .collect()
}

/// Expand a leading `~` to the current user's home directory
///
/// # Errors
///
/// `~user/...` is rejected, as is any `~` path when no home directory is known.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    let Some(rest) = path.strip_prefix('~') else {
        return Ok(PathBuf::from(path));
    };

    let rest = if rest.is_empty() {
        rest
    } else if let Some(stripped) = rest.strip_prefix(['/', std::path::MAIN_SEPARATOR]) {
        stripped
    } else {
        return Err(KubesealError::config(format!(
            "cannot expand user-specific home dir: {path}"
        )));
    };

    let home = dirs::home_dir()
        .ok_or_else(|| KubesealError::config("cannot expand ~: home directory is unknown"))?;
    if rest.is_empty() {
        Ok(home)
    } else {
        Ok(home.join(rest))
    }
}
