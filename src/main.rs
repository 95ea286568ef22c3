//! # kubeseal-provider CLI
//!
//! Seals declarative secret resources against a cluster's sealed-secrets
//! controller.
//!
//! ## Usage
//!
//! ```bash
//! # Seal a resource and print the recorded state as JSON
//! kubeseal-provider seal --resource db.yaml --provider provider.yaml
//!
//! # Re-seal only when the secret values changed
//! kubeseal-provider update --resource db.yaml --state db.state.json --changed
//!
//! # Print the controller certificate
//! kubeseal-provider cert --controller-name sealed-secrets-controller --controller-namespace kube-system
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kubeseal_provider::certificate::{CertificateSource, ClusterCertificateFetcher};
use kubeseal_provider::cluster::{ClusterConfigResolver, GuardedConnectionConfig};
use kubeseal_provider::config::{ProviderConfig, ProviderSettings};
use kubeseal_provider::observability::{self, metrics};
use kubeseal_provider::reconciler::{
    Reconciler, ResourceState, SealedSecretReconciler, SecretResource,
};
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Seal Kubernetes secrets for a sealed-secrets controller
#[derive(Parser)]
#[command(name = "kubeseal-provider", version = VERSION, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Provider configuration file holding the `kubernetes` connection block
    #[arg(long, global = true, value_name = "FILE")]
    provider: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Seal a secret resource and print its state
    Seal {
        /// Secret resource file (YAML or JSON)
        #[arg(long, value_name = "FILE")]
        resource: PathBuf,

        /// Print only the sealed manifest
        #[arg(long)]
        manifest_only: bool,
    },
    /// Update a previously sealed resource
    Update {
        /// Secret resource file (YAML or JSON)
        #[arg(long, value_name = "FILE")]
        resource: PathBuf,

        /// State printed by a previous `seal` or `update`
        #[arg(long, value_name = "FILE")]
        state: PathBuf,

        /// The secret values changed since the state was recorded
        #[arg(long)]
        changed: bool,

        /// Print only the sealed manifest
        #[arg(long)]
        manifest_only: bool,
    },
    /// Fetch and print the controller certificate
    Cert {
        #[arg(long, default_value = "sealed-secrets-controller")]
        controller_name: String,

        #[arg(long, default_value = "kube-system")]
        controller_namespace: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = ProviderSettings::from_env();
    observability::init_logging(&settings);
    if settings.enable_metrics {
        if let Err(e) = metrics::register_metrics() {
            warn!("Failed to register metrics: {}", e);
        }
    }

    kubeseal_provider::init_rustls();

    let provider: ProviderConfig = match &cli.provider {
        Some(path) => read_document(path)?,
        None => ProviderConfig::default(),
    };
    let fields = provider.kubernetes_fields().with_env_defaults();
    fields
        .validate()
        .context("Invalid kubernetes connection block")?;

    let connection = ClusterConfigResolver::from_env()
        .resolve(&fields)
        .await
        .context("Failed to resolve cluster connection")?;
    info!("Connecting to {}", connection.cluster_url());
    let connection = Arc::new(GuardedConnectionConfig::new(connection));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let reconciler = SealedSecretReconciler::for_connection(Arc::clone(&connection))
        .with_cancellation(cancel.clone());

    match cli.command {
        Commands::Seal {
            resource,
            manifest_only,
        } => {
            let resource: SecretResource = read_document(&resource)?;
            let state = reconciler
                .create(&resource)
                .await
                .with_context(|| format!("Failed to seal {}/{}", resource.namespace, resource.name))?;
            print_state(&state, manifest_only)?;
        }
        Commands::Update {
            resource,
            state,
            changed,
            manifest_only,
        } => {
            let resource: SecretResource = read_document(&resource)?;
            let prior: ResourceState = read_document(&state)?;
            let next = reconciler
                .update(&resource, &prior, changed)
                .await
                .with_context(|| {
                    format!("Failed to update {}/{}", resource.namespace, resource.name)
                })?;
            print_state(&next, manifest_only)?;
        }
        Commands::Cert {
            controller_name,
            controller_namespace,
        } => {
            let bundle = ClusterCertificateFetcher::new(connection)
                .fetch(&controller_name, &controller_namespace, &cancel)
                .await
                .context("Failed to fetch controller certificate")?;
            std::io::stdout()
                .write_all(bundle.as_bytes())
                .context("Failed to write certificate")?;
        }
    }

    if settings.enable_metrics {
        match metrics::gather_text() {
            Ok(text) => std::io::stderr()
                .write_all(text.as_bytes())
                .context("Failed to write metrics")?,
            Err(e) => warn!("Failed to gather metrics: {}", e),
        }
    }

    Ok(())
}

/// Read a YAML (or JSON) document from `path`
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_state(state: &ResourceState, manifest_only: bool) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    if manifest_only {
        stdout.write_all(state.manifest.as_bytes())?;
    } else {
        let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
        writeln!(stdout, "{json}")?;
    }
    Ok(())
}
