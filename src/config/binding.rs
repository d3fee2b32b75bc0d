//! # Binding Configuration
//!
//! Engine-level settings loaded from environment variables.

use crate::binding::comparator::ComparisonMode;
use crate::binding::resolver::FailurePolicy;
use crate::constants::{DEFAULT_ANNOTATION_PREFIX, DEFAULT_REQUEST_TIMEOUT_SECS};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Binding engine configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConfig {
    /// Annotation prefix marking binding declarations
    pub annotation_prefix: String,
    /// Whether one failed declaration aborts the whole pass
    pub failure_policy: FailurePolicy,
    /// How `is_same` treats keys only present on the existing Secret
    pub comparison_mode: ComparisonMode,
    /// Upper bound for one resolution pass (seconds)
    pub request_timeout_secs: u64,
    /// Log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            annotation_prefix: DEFAULT_ANNOTATION_PREFIX.to_string(),
            failure_policy: FailurePolicy::default(),
            comparison_mode: ComparisonMode::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_level: "INFO".to_string(),
            log_enable_color: false,
        }
    }
}

impl BindingConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            annotation_prefix: lookup("BINDING_ANNOTATION_PREFIX")
                .map(normalize_prefix)
                .unwrap_or(defaults.annotation_prefix),
            failure_policy: parse_or_default(
                &lookup,
                "BINDING_FAILURE_POLICY",
                defaults.failure_policy,
            ),
            comparison_mode: parse_or_default(
                &lookup,
                "BINDING_COMPARISON_MODE",
                defaults.comparison_mode,
            ),
            request_timeout_secs: parse_or_default(
                &lookup,
                "BINDING_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_enable_color: lookup("LOG_ENABLE_COLOR")
                .map_or(defaults.log_enable_color, |v| parse_bool(&v)),
        }
    }

    /// Get request timeout duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Prefixes always end in '/' so `<prefix><path>` splits cleanly
fn normalize_prefix(prefix: String) -> String {
    if prefix.ends_with('/') {
        prefix
    } else {
        format!("{prefix}/")
    }
}

/// Parse a variable, warning and falling back to the default when it is invalid
fn parse_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid value '{}' for {}: {}, using default", raw, key, e);
            default
        }),
    }
}

fn parse_bool(v: &str) -> bool {
    let v_lower = v.to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> BindingConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        BindingConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config, BindingConfig::default());
        assert_eq!(config.failure_policy, FailurePolicy::BestEffort);
        assert_eq!(config.comparison_mode, ComparisonMode::Exact);
        assert_eq!(config.request_timeout(), Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("BINDING_ANNOTATION_PREFIX", "bind.example.com"),
            ("BINDING_FAILURE_POLICY", "abort"),
            ("BINDING_COMPARISON_MODE", "subset"),
            ("BINDING_REQUEST_TIMEOUT_SECS", "5"),
            ("LOG_ENABLE_COLOR", "yes"),
        ]);
        assert_eq!(config.annotation_prefix, "bind.example.com/");
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.comparison_mode, ComparisonMode::Subset);
        assert_eq!(config.request_timeout_secs, 5);
        assert!(config.log_enable_color);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config(&[
            ("BINDING_FAILURE_POLICY", "sometimes"),
            ("BINDING_REQUEST_TIMEOUT_SECS", "soon"),
        ]);
        assert_eq!(config.failure_policy, FailurePolicy::BestEffort);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }
}
