//! # Metrics
//!
//! Prometheus metrics for the sealing pipeline.
//!
//! ## Metrics Exposed
//!
//! - `kubeseal_seals_total` - Total number of successful seals
//! - `kubeseal_seal_errors_total` - Failed seals, labelled by error kind
//! - `kubeseal_seal_duration_seconds` - Duration of a full pipeline run
//! - `kubeseal_certificate_fetches_total` - Total number of certificate fetches
//! - `kubeseal_certificate_fetch_errors_total` - Total number of failed certificate fetches
//! - `kubeseal_certificate_fetch_duration_seconds` - Duration of certificate fetches

use crate::error::ErrorKind;
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static SEALS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("kubeseal_seals_total", "Total number of successful seals")
        .expect("Failed to create SEALS_TOTAL metric - this should never happen")
});

static SEAL_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kubeseal_seal_errors_total",
            "Total number of failed seals by error kind",
        ),
        &["kind"],
    )
    .expect("Failed to create SEAL_ERRORS_TOTAL metric - this should never happen")
});

static SEAL_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "kubeseal_seal_duration_seconds",
            "Duration of a full sealing pipeline run in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .expect("Failed to create SEAL_DURATION metric - this should never happen")
});

static CERTIFICATE_FETCHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "kubeseal_certificate_fetches_total",
        "Total number of controller certificate fetches",
    )
    .expect("Failed to create CERTIFICATE_FETCHES_TOTAL metric - this should never happen")
});

static CERTIFICATE_FETCH_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "kubeseal_certificate_fetch_errors_total",
        "Total number of failed controller certificate fetches",
    )
    .expect("Failed to create CERTIFICATE_FETCH_ERRORS_TOTAL metric - this should never happen")
});

static CERTIFICATE_FETCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "kubeseal_certificate_fetch_duration_seconds",
            "Duration of controller certificate fetches in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
    )
    .expect("Failed to create CERTIFICATE_FETCH_DURATION metric - this should never happen")
});

/// Register every metric with the shared registry
///
/// # Errors
///
/// Fails if a metric was already registered.
pub fn register_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(SEALS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SEAL_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SEAL_DURATION.clone()))?;
    REGISTRY.register(Box::new(CERTIFICATE_FETCHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CERTIFICATE_FETCH_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CERTIFICATE_FETCH_DURATION.clone()))?;

    Ok(())
}

/// Text exposition of the shared registry
///
/// # Errors
///
/// Fails if the encoder rejects a metric family.
pub fn gather_text() -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn increment_seals() {
    SEALS_TOTAL.inc();
}

pub fn increment_seal_errors(kind: ErrorKind) {
    SEAL_ERRORS_TOTAL.with_label_values(&[kind.as_str()]).inc();
}

pub fn observe_seal_duration(duration: f64) {
    SEAL_DURATION.observe(duration);
}

pub fn increment_certificate_fetches() {
    CERTIFICATE_FETCHES_TOTAL.inc();
}

pub fn increment_certificate_fetch_errors() {
    CERTIFICATE_FETCH_ERRORS_TOTAL.inc();
}

pub fn observe_certificate_fetch_duration(duration: f64) {
    CERTIFICATE_FETCH_DURATION.observe(duration);
}
