//! # Manifest
//!
//! Canonical plaintext secret document fed into the sealing step.
//!
//! Every value is turned into its string form and that string is base64
//! encoded, whatever the original kind was. Values that already look like
//! base64 are not decoded first. Keys live in a sorted map, so the order in
//! which the caller supplied them never changes the output.
//!
//! The rendered document carries only `apiVersion`, `kind`, `metadata.name`,
//! `metadata.namespace`, `type` and `data`. No server-assigned metadata.

use crate::constants::{SECRET_API_VERSION, SECRET_KIND, SECRET_TYPE_OPAQUE};
use crate::error::{KubesealError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Scalar value of a secret entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum SecretValue {
    String(String),
    Bool(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretValue::String(v) => f.write_str(v),
            SecretValue::Bool(v) => write!(f, "{v}"),
            SecretValue::Integer(v) => write!(f, "{v}"),
            SecretValue::Unsigned(v) => write!(f, "{v}"),
            SecretValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for SecretValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SecretValue::String(v) => serializer.serialize_str(v),
            SecretValue::Bool(v) => serializer.serialize_bool(*v),
            SecretValue::Integer(v) => serializer.serialize_i64(*v),
            SecretValue::Unsigned(v) => serializer.serialize_u64(*v),
            SecretValue::Float(v) => serializer.serialize_f64(*v),
        }
    }
}

impl TryFrom<serde_json::Value> for SecretValue {
    type Error = KubesealError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        use serde_json::Value;
        match value {
            Value::String(v) => Ok(SecretValue::String(v)),
            Value::Bool(v) => Ok(SecretValue::Bool(v)),
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(SecretValue::Integer(v))
                } else if let Some(v) = n.as_u64() {
                    Ok(SecretValue::Unsigned(v))
                } else {
                    n.as_f64().map(SecretValue::Float).ok_or_else(|| {
                        KubesealError::validation(format!("unsupported number {n}"))
                    })
                }
            }
            Value::Null => Err(KubesealError::validation(
                "secret values must be strings, booleans or numbers, found null",
            )),
            Value::Array(_) => Err(KubesealError::validation(
                "secret values must be strings, booleans or numbers, found a list",
            )),
            Value::Object(_) => Err(KubesealError::validation(
                "secret values must be strings, booleans or numbers, found a map",
            )),
        }
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        SecretValue::String(value.to_string())
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        SecretValue::String(value)
    }
}

impl From<bool> for SecretValue {
    fn from(value: bool) -> Self {
        SecretValue::Bool(value)
    }
}

impl From<i64> for SecretValue {
    fn from(value: i64) -> Self {
        SecretValue::Integer(value)
    }
}

impl From<f64> for SecretValue {
    fn from(value: f64) -> Self {
        SecretValue::Float(value)
    }
}

/// Validated declarative secret
#[derive(Debug, Clone, PartialEq)]
pub struct SecretSpec {
    name: String,
    namespace: String,
    secret_type: String,
    data: BTreeMap<String, SecretValue>,
}

impl SecretSpec {
    /// Build a spec from caller input
    ///
    /// # Errors
    ///
    /// Rejects an empty name or namespace and duplicate keys.
    pub fn new<I, K, V>(
        name: impl Into<String>,
        namespace: impl Into<String>,
        secret_type: impl Into<String>,
        data: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SecretValue>,
    {
        let name = name.into();
        let namespace = namespace.into();
        if name.is_empty() {
            return Err(KubesealError::validation("secret name must not be empty"));
        }
        if namespace.is_empty() {
            return Err(KubesealError::validation(
                "secret namespace must not be empty",
            ));
        }

        let mut entries = BTreeMap::new();
        for (key, value) in data {
            let key = key.into();
            if entries.insert(key.clone(), value.into()).is_some() {
                return Err(KubesealError::validation(format!(
                    "duplicate secret key {key:?}"
                )));
            }
        }

        Ok(Self {
            name,
            namespace,
            secret_type: secret_type.into(),
            data: entries,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn secret_type(&self) -> &str {
        &self.secret_type
    }

    #[must_use]
    pub fn data(&self) -> &BTreeMap<String, SecretValue> {
        &self.data
    }

    #[must_use]
    pub fn keys(&self) -> BTreeSet<String> {
        self.data.keys().cloned().collect()
    }
}

/// Canonical form of a secret: name, namespace and base64-encoded values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSecretManifest {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, String>,
}

impl CanonicalSecretManifest {
    #[must_use]
    pub fn build(spec: &SecretSpec) -> Self {
        build_manifest(spec.name(), spec.namespace(), spec.data())
    }

    /// Serialized secret document
    ///
    /// # Errors
    ///
    /// Fails only if the document cannot be serialized.
    pub fn render(&self) -> Result<Vec<u8>> {
        render_manifest(&self.name, &self.namespace, &self.data)
    }
}

/// Canonicalize `values` for `namespace/name`
#[must_use]
pub fn build_manifest(
    name: &str,
    namespace: &str,
    values: &BTreeMap<String, SecretValue>,
) -> CanonicalSecretManifest {
    let data = values
        .iter()
        .map(|(key, value)| (key.clone(), STANDARD.encode(value.to_string())))
        .collect();
    CanonicalSecretManifest {
        name: name.to_string(),
        namespace: namespace.to_string(),
        data,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SecretDocument<'a> {
    api_version: &'static str,
    kind: &'static str,
    metadata: SecretMetadata<'a>,
    #[serde(rename = "type")]
    secret_type: &'static str,
    data: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct SecretMetadata<'a> {
    name: &'a str,
    namespace: &'a str,
}

/// Render the minimal secret document for already-encoded data
///
/// # Errors
///
/// Fails only if the document cannot be serialized.
pub fn render_manifest(
    name: &str,
    namespace: &str,
    encoded_data: &BTreeMap<String, String>,
) -> Result<Vec<u8>> {
    let document = SecretDocument {
        api_version: SECRET_API_VERSION,
        kind: SECRET_KIND,
        metadata: SecretMetadata { name, namespace },
        secret_type: SECRET_TYPE_OPAQUE,
        data: encoded_data,
    };
    serde_yaml::to_string(&document)
        .map(String::into_bytes)
        .map_err(|e| KubesealError::validation(format!("cannot render secret manifest: {e}")))
}
