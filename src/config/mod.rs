//! # Configuration
//!
//! Declarative provider configuration and process-level settings.
//!
//! The provider document mirrors the declarative layout: a single optional
//! `kubernetes` block holding the connection fields.

mod kubernetes;
mod settings;

pub use kubernetes::{ExecFields, KubernetesFields};
pub(crate) use kubernetes::{non_empty, single_exec};
pub use settings::ProviderSettings;

use serde::{Deserialize, Serialize};

/// Provider-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kubernetes: Option<KubernetesFields>,
}

impl ProviderConfig {
    /// The connection fields, falling back to an empty block
    #[must_use]
    pub fn kubernetes_fields(&self) -> KubernetesFields {
        self.kubernetes.clone().unwrap_or_default()
    }
}
