//! # Static Overrides
//!
//! Explicit connection fields layered on top of whatever the kubeconfig
//! files provided. Overrides always win.

use crate::config::{non_empty, single_exec, ExecFields, KubernetesFields};
use crate::error::{KubesealError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http::Uri;
use kube::config::ExecConfig;
use secrecy::SecretString;
use serde_json::json;

/// Apply every explicit field to `config`
///
/// Overrides run after kube has derived its server URL, so an overridden host
/// goes through [`default_server_url`] here instead.
///
/// # Errors
///
/// Fails on an unparseable CA bundle, a host that is not a URL or
/// `host:port` pair, or a malformed exec block.
pub(crate) fn apply_overrides(config: &mut kube::Config, fields: &KubernetesFields) -> Result<()> {
    if let Some(insecure) = fields.insecure {
        config.accept_invalid_certs = insecure;
    }

    let ca = non_empty(fields.cluster_ca_certificate.as_ref());
    if let Some(ca) = ca {
        config.root_cert = Some(parse_ca_bundle(ca)?);
    }

    let client_cert = non_empty(fields.client_certificate.as_ref());
    if let Some(cert) = client_cert {
        // kubeconfig *-data fields carry base64 of the PEM text
        config.auth_info.client_certificate_data = Some(STANDARD.encode(cert));
    }

    if let Some(host) = non_empty(fields.host.as_ref()) {
        let default_tls = ca.is_some() || client_cert.is_some() || fields.insecure == Some(true);
        config.cluster_url = default_server_url(host, default_tls)?;
    }

    if let Some(username) = non_empty(fields.username.as_ref()) {
        config.auth_info.username = Some(username.to_string());
    }
    if let Some(password) = non_empty(fields.password.as_ref()) {
        config.auth_info.password = Some(SecretString::from(password.to_string()));
    }
    if let Some(key) = non_empty(fields.client_key.as_ref()) {
        config.auth_info.client_key_data = Some(SecretString::from(STANDARD.encode(key)));
    }
    if let Some(token) = non_empty(fields.token.as_ref()) {
        config.auth_info.token = Some(SecretString::from(token.to_string()));
    }

    if let Some(exec) = &fields.exec {
        config.auth_info.exec = Some(exec_config(exec)?);
    }

    Ok(())
}

/// Complete server URL for `host`
///
/// A host that already carries a scheme and authority is used as-is.
/// Otherwise the scheme is `https` when TLS material or the insecure flag is
/// present and `http` when not.
///
/// # Errors
///
/// Empty hosts, hosts with a path component and unparseable hosts are rejected.
pub fn default_server_url(host: &str, default_tls: bool) -> Result<Uri> {
    if host.is_empty() {
        return Err(KubesealError::config(
            "host must be a URL or a host:port pair",
        ));
    }

    let uri = match host
        .parse::<Uri>()
        .ok()
        .filter(|u| u.scheme().is_some() && u.authority().is_some())
    {
        Some(uri) => uri,
        None => {
            let scheme = if default_tls { "https" } else { "http" };
            format!("{scheme}://{host}").parse::<Uri>().map_err(|e| {
                KubesealError::config(format!("host must be a URL or a host:port pair: {host:?}: {e}"))
            })?
        }
    };

    if uri.authority().is_none() {
        return Err(KubesealError::config(format!(
            "host must be a URL or a host:port pair: {host:?}"
        )));
    }
    let path = uri.path();
    if !path.is_empty() && path != "/" {
        return Err(KubesealError::config(format!(
            "host must be a URL or a host:port pair: {host:?}"
        )));
    }

    Ok(uri)
}

/// Exec credential plugin config from the single-element list form
///
/// # Errors
///
/// Returns a configuration error when the list does not hold exactly one
/// block or a required sub-field is missing.
pub fn exec_config(exec: &[ExecFields]) -> Result<ExecConfig> {
    let (spec, api_version, command) = single_exec(exec)?;
    let env: Vec<_> = spec
        .env
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();

    serde_json::from_value(json!({
        "apiVersion": api_version,
        "command": command,
        "args": spec.args,
        "env": env,
    }))
    .map_err(|e| KubesealError::config(format!("failed to parse exec: {e}")))
}

fn parse_ca_bundle(bundle: &str) -> Result<Vec<Vec<u8>>> {
    let blocks = pem::parse_many(bundle.as_bytes())
        .map_err(|e| KubesealError::config(format!("invalid cluster_ca_certificate: {e}")))?;
    let ders: Vec<Vec<u8>> = blocks
        .into_iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .map(|block| block.into_contents())
        .collect();
    if ders.is_empty() {
        return Err(KubesealError::config(
            "invalid cluster_ca_certificate: no certificates found",
        ));
    }
    Ok(ders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn base_config() -> kube::Config {
        kube::Config::new("https://from-kubeconfig:6443".parse().unwrap())
    }

    #[test]
    fn test_bare_host_defaults_to_http_without_tls() {
        let uri = default_server_url("10.0.0.1:8080", false).unwrap();
        assert_eq!(uri.scheme_str(), Some("http"));
        assert_eq!(uri.authority().map(|a| a.as_str()), Some("10.0.0.1:8080"));
    }

    #[test]
    fn test_bare_host_defaults_to_https_with_tls() {
        let uri = default_server_url("cluster.example:6443", true).unwrap();
        assert_eq!(uri.scheme_str(), Some("https"));
        assert_eq!(uri.port_u16(), Some(6443));
    }

    #[test]
    fn test_full_url_is_kept() {
        let uri = default_server_url("http://cluster.example:6443", true).unwrap();
        assert_eq!(uri.scheme_str(), Some("http"));
    }

    #[test]
    fn test_host_with_path_is_rejected() {
        assert!(default_server_url("https://cluster.example/prefix", false).is_err());
        assert!(default_server_url("", false).is_err());
    }

    #[test]
    fn test_insecure_flag_makes_host_tls() {
        let mut config = base_config();
        let fields = KubernetesFields {
            host: Some("cluster.example:6443".to_string()),
            insecure: Some(true),
            ..Default::default()
        };
        apply_overrides(&mut config, &fields).unwrap();
        assert!(config.accept_invalid_certs);
        assert_eq!(config.cluster_url.scheme_str(), Some("https"));
    }

    #[test]
    fn test_ca_certificate_makes_host_tls() {
        let mut config = base_config();
        let fields = KubernetesFields {
            host: Some("cluster.example:6443".to_string()),
            cluster_ca_certificate: Some(
                include_str!("../../tests/fixtures/sealed-secrets-cert.pem").to_string(),
            ),
            ..Default::default()
        };
        apply_overrides(&mut config, &fields).unwrap();
        assert_eq!(config.cluster_url.scheme_str(), Some("https"));
        assert_eq!(config.cluster_url.host(), Some("cluster.example"));
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_client_certificate_makes_host_tls() {
        let mut config = base_config();
        let fields = KubernetesFields {
            host: Some("cluster.example:6443".to_string()),
            client_certificate: Some(
                include_str!("../../tests/fixtures/sealed-secrets-cert.pem").to_string(),
            ),
            ..Default::default()
        };
        apply_overrides(&mut config, &fields).unwrap();
        assert_eq!(config.cluster_url.scheme_str(), Some("https"));
        assert_eq!(config.cluster_url.port_u16(), Some(6443));
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn test_credentials_override_file_values() {
        let mut config = base_config();
        config.auth_info.username = Some("from-file".to_string());
        let fields = KubernetesFields {
            username: Some("admin".to_string()),
            password: Some("hunter2".to_string()),
            token: Some("bearer".to_string()),
            client_key: Some("KEY".to_string()),
            ..Default::default()
        };
        apply_overrides(&mut config, &fields).unwrap();
        assert_eq!(config.auth_info.username.as_deref(), Some("admin"));
        assert_eq!(
            config.auth_info.password.as_ref().map(|p| p.expose_secret().to_string()),
            Some("hunter2".to_string())
        );
        assert_eq!(
            config.auth_info.token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("bearer".to_string())
        );
        assert_eq!(
            config.auth_info.client_key_data.as_ref().map(|k| k.expose_secret().to_string()),
            Some(STANDARD.encode("KEY"))
        );
        // kubeconfig server untouched without a host override
        assert_eq!(config.cluster_url.host(), Some("from-kubeconfig"));
    }

    #[test]
    fn test_ca_bundle_override() {
        let mut config = base_config();
        let fields = KubernetesFields {
            cluster_ca_certificate: Some(
                include_str!("../../tests/fixtures/sealed-secrets-cert.pem").to_string(),
            ),
            ..Default::default()
        };
        apply_overrides(&mut config, &fields).unwrap();
        assert_eq!(config.root_cert.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_garbage_ca_bundle_is_configuration_error() {
        let mut config = base_config();
        let fields = KubernetesFields {
            cluster_ca_certificate: Some("not a pem".to_string()),
            ..Default::default()
        };
        let err = apply_overrides(&mut config, &fields).unwrap_err();
        assert!(matches!(err, KubesealError::Configuration(_)));
    }

    #[test]
    fn test_exec_config_built_from_single_block() {
        let exec = vec![ExecFields {
            api_version: Some("client.authentication.k8s.io/v1beta1".to_string()),
            command: Some("aws".to_string()),
            args: vec!["eks".to_string(), "get-token".to_string()],
            env: [("AWS_PROFILE".to_string(), "prod".to_string())]
                .into_iter()
                .collect(),
        }];
        let config = exec_config(&exec).unwrap();
        assert_eq!(config.command.as_deref(), Some("aws"));
        assert_eq!(
            config.api_version.as_deref(),
            Some("client.authentication.k8s.io/v1beta1")
        );
        assert_eq!(config.args.as_ref().map(Vec::len), Some(2));
        let env = config.env.unwrap();
        assert_eq!(env[0].get("name").map(String::as_str), Some("AWS_PROFILE"));
        assert_eq!(env[0].get("value").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_exec_missing_command_is_configuration_error() {
        let exec = vec![ExecFields {
            api_version: Some("client.authentication.k8s.io/v1beta1".to_string()),
            ..Default::default()
        }];
        let err = exec_config(&exec).unwrap_err();
        assert!(matches!(err, KubesealError::Configuration(_)));
    }
}
