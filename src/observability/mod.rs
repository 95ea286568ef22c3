//! # Observability
//!
//! - `metrics`: Prometheus metrics collection
//! - [`init_logging`]: tracing subscriber for the binary

pub mod metrics;

use crate::config::ProviderSettings;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "kubeseal_provider";

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence. Without it the crate logs at
/// `settings.log_level`. Logs go to stderr so stdout stays free for output.
pub fn init_logging(settings: &ProviderSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{DEFAULT_DIRECTIVE}={}", settings.log_level.to_lowercase()).into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A second install (tests, embedding) keeps the first subscriber
    let _ = if settings.json_logs() {
        builder.json().try_init()
    } else {
        builder.with_ansi(settings.log_enable_color).try_init()
    };
}
