//! # Metrics
//!
//! Prometheus metrics for binding resolution and Secret synthesis.
//!
//! ## Metrics Exposed
//!
//! - `binding_resolutions_total` - Total number of resolution passes
//! - `binding_resolution_duration_seconds` - Duration of resolution passes
//! - `binding_extraction_errors_total` - Extraction failures by error class
//! - `binding_skipped_declarations_total` - Declarations skipped (unknown tag, malformed)
//! - `binding_secrets_created_total` - Derived Secrets created
//! - `binding_secrets_unchanged_total` - Syntheses that found the Secret already present
//! - `binding_secrets_deleted_total` - Derived Secrets deleted

use anyhow::Result;
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RESOLUTIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "binding_resolutions_total",
        "Total number of binding resolution passes",
    )
    .expect("Failed to create RESOLUTIONS_TOTAL metric - this should never happen")
});

static RESOLUTION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "binding_resolution_duration_seconds",
            "Duration of binding resolution passes in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
    )
    .expect("Failed to create RESOLUTION_DURATION metric - this should never happen")
});

static EXTRACTION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "binding_extraction_errors_total",
            "Total number of failed extractions by error class",
        ),
        &["class"],
    )
    .expect("Failed to create EXTRACTION_ERRORS_TOTAL metric - this should never happen")
});

static SKIPPED_DECLARATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "binding_skipped_declarations_total",
        "Total number of binding declarations skipped as unknown or malformed",
    )
    .expect("Failed to create SKIPPED_DECLARATIONS_TOTAL metric - this should never happen")
});

static SECRETS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "binding_secrets_created_total",
        "Total number of derived Secrets created",
    )
    .expect("Failed to create SECRETS_CREATED_TOTAL metric - this should never happen")
});

static SECRETS_UNCHANGED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "binding_secrets_unchanged_total",
        "Total number of syntheses that found the derived Secret already present",
    )
    .expect("Failed to create SECRETS_UNCHANGED_TOTAL metric - this should never happen")
});

static SECRETS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "binding_secrets_deleted_total",
        "Total number of derived Secrets deleted",
    )
    .expect("Failed to create SECRETS_DELETED_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RESOLUTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESOLUTION_DURATION.clone()))?;
    REGISTRY.register(Box::new(EXTRACTION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SKIPPED_DECLARATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_UNCHANGED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_DELETED_TOTAL.clone()))?;

    Ok(())
}

/// Render registered metrics in the Prometheus text format
#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only if encoding into a Vec fails"
)]
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn increment_resolutions() {
    RESOLUTIONS_TOTAL.inc();
}

pub fn observe_resolution_duration(duration: f64) {
    RESOLUTION_DURATION.observe(duration);
}

pub fn increment_extraction_errors(class: &str) {
    EXTRACTION_ERRORS_TOTAL.with_label_values(&[class]).inc();
}

pub fn increment_skipped_declarations() {
    SKIPPED_DECLARATIONS_TOTAL.inc();
}

pub fn increment_secrets_created() {
    SECRETS_CREATED_TOTAL.inc();
}

pub fn increment_secrets_unchanged() {
    SECRETS_UNCHANGED_TOTAL.inc();
}

pub fn increment_secrets_deleted() {
    SECRETS_DELETED_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_render() {
        register_metrics().expect("first registration");
        increment_resolutions();
        increment_extraction_errors("not_found");

        let text = render().expect("render");
        assert!(text.contains("binding_resolutions_total"));
        assert!(text.contains("binding_extraction_errors_total{class=\"not_found\"}"));

        // Registering twice is rejected by the registry
        assert!(register_metrics().is_err());
    }
}
