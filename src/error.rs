//! # Errors
//!
//! Error taxonomy for binding resolution and Secret synthesis.
//!
//! Errors are classified so callers can pick a retry policy:
//! - `NotFound`: the referenced object or key is absent. Usually clears once the
//!   referenced object appears, so a later pass may succeed.
//! - `Forbidden` / `Transient`: access or connectivity failures, retryable by the caller.
//! - `Malformed` / `NoHandler`: bad annotations, not retryable without operator action.
//! - `Conflict`: a create raced another create of the same name.

use thiserror::Error;

/// Errors returned by a [`crate::client::ResourceClient`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("access denied: {0}")]
    Forbidden(String),
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("API request failed: {0}")]
    Transient(String),
}

impl ClientError {
    /// Classify a `kube::Error` for the given object coordinates
    #[must_use]
    pub fn from_kube(err: kube::Error, kind: &str, namespace: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(resp) => {
                Self::from_status(resp.code, &resp.message, kind, namespace, name)
            }
            other => ClientError::Transient(other.to_string()),
        }
    }

    /// Classify an API status code for the given object coordinates
    #[must_use]
    pub fn from_status(code: u16, message: &str, kind: &str, namespace: &str, name: &str) -> Self {
        match code {
            404 => ClientError::NotFound {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            409 => ClientError::AlreadyExists {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            401 | 403 => ClientError::Forbidden(message.to_string()),
            _ => ClientError::Transient(format!("{code}: {message}")),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// Errors produced while resolving bindings or synthesizing the derived Secret
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// Referenced object, field or key is absent
    #[error("not found: {0}")]
    NotFound(String),
    /// Access denied by the API server
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Connectivity or server-side failure
    #[error("transient failure: {0}")]
    Transient(String),
    /// Annotation or coordinates cannot be interpreted
    #[error("malformed binding '{annotation}': {reason}")]
    Malformed { annotation: String, reason: String },
    /// No registered handler recognizes the tag
    #[error("no handler for tag '{tag}' on annotation '{annotation}'")]
    NoHandler { annotation: String, tag: String },
    /// Create raced with another create of the same name
    #[error("conflict: {0}")]
    Conflict(String),
    /// Object could not be converted to or from its wire form
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl BindingError {
    pub(crate) fn malformed(annotation: &str, reason: impl Into<String>) -> Self {
        BindingError::Malformed {
            annotation: annotation.to_string(),
            reason: reason.into(),
        }
    }

    /// Check if this error is transient (the same pass may succeed when retried)
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, BindingError::Forbidden(_) | BindingError::Transient(_))
    }

    /// Check if a later pass may succeed without operator intervention
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            BindingError::NotFound(_)
            | BindingError::Forbidden(_)
            | BindingError::Transient(_)
            | BindingError::Conflict(_) => true,
            BindingError::Malformed { .. }
            | BindingError::NoHandler { .. }
            | BindingError::Serialization(_) => false,
        }
    }

    /// Short class name, used as a metrics label
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            BindingError::NotFound(_) => "not_found",
            BindingError::Forbidden(_) => "forbidden",
            BindingError::Transient(_) => "transient",
            BindingError::Malformed { .. } => "malformed",
            BindingError::NoHandler { .. } => "no_handler",
            BindingError::Conflict(_) => "conflict",
            BindingError::Serialization(_) => "serialization",
        }
    }

    /// Get remediation guidance for this error
    #[must_use]
    pub fn remediation(&self) -> String {
        match self {
            BindingError::NotFound(what) => {
                format!("Create {what} or fix the reference; the next pass will pick it up")
            }
            BindingError::Forbidden(_) => {
                "Grant the controller's service account get access to the referenced kind"
                    .to_string()
            }
            BindingError::Transient(_) => "Retry on the next reconciliation".to_string(),
            BindingError::Malformed { annotation, .. } => {
                format!("Fix annotation '{annotation}' on the source resource")
            }
            BindingError::NoHandler { tag, .. } => {
                format!("Tag '{tag}' is not supported; use a secret, configmap, resource or attribute tag")
            }
            BindingError::Conflict(_) => "No action needed".to_string(),
            BindingError::Serialization(e) => format!("Report this as a bug: {e}"),
        }
    }
}

impl From<ClientError> for BindingError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound { .. } => BindingError::NotFound(err.to_string()),
            ClientError::Forbidden(msg) => BindingError::Forbidden(msg),
            ClientError::AlreadyExists { .. } => BindingError::Conflict(err.to_string()),
            ClientError::Transient(msg) => BindingError::Transient(msg),
        }
    }
}

impl From<serde_json::Error> for BindingError {
    fn from(err: serde_json::Error) -> Self {
        BindingError::Serialization(err.to_string())
    }
}
