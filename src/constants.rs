//! # Constants
//!
//! Shared constants used throughout the binding engine.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default prefix for binding annotations on source resources
pub const DEFAULT_ANNOTATION_PREFIX: &str = "binding.octopilot.io/";

/// Tag selecting the Secret reader
pub const SECRET_TAG: &str = "binding:env:object:secret";

/// Tag selecting the ConfigMap reader
pub const CONFIGMAP_TAG: &str = "binding:env:object:configmap";

/// Tag prefix selecting the generic resource reader.
/// The group/version/kind follows the prefix, e.g. `binding:env:object:resource:apps/v1/Deployment`
pub const RESOURCE_TAG_PREFIX: &str = "binding:env:object:resource:";

/// Tag selecting the attribute reader (field on the source resource itself)
pub const ATTRIBUTE_TAG: &str = "binding:env:attribute";

/// Separator between the field path and the source key in an annotation key
pub const SOURCE_KEY_SEPARATOR: char = '-';

/// Separator between the base name and the fingerprint of a derived Secret
pub const FINGERPRINT_SEPARATOR: &str = "-";

/// Maximum length of a Kubernetes object name (DNS-1123 subdomain)
pub const MAX_OBJECT_NAME_LENGTH: usize = 253;

/// Label marking Secrets created by this engine
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of the managed-by label
pub const MANAGED_BY_VALUE: &str = "binding-secret-controller";

/// Annotation carrying the payload fingerprint on derived Secrets
pub const FINGERPRINT_ANNOTATION: &str = "binding.octopilot.io/fingerprint";

/// Default timeout for one resolution pass against the API server (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
