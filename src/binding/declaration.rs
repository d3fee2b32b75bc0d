//! # Binding Declarations
//!
//! Parses binding annotations on a source resource into [`BindingDeclaration`]s.
//!
//! ## Annotation Format
//!
//! ```yaml
//! metadata:
//!   annotations:
//!     # Every key of the Secret named by spec.dbCredentials
//!     binding.octopilot.io/spec.dbCredentials: binding:env:object:secret
//!     # Only the "password" key of the ConfigMap named by status.configMapRef
//!     binding.octopilot.io/status.configMapRef-password: binding:env:object:configmap
//!     # status.endpoint of the Cluster named by spec.clusterRef
//!     binding.octopilot.io/spec.clusterRef-status.endpoint: binding:env:object:resource:postgresql.cnpg.io/v1/Cluster
//!     # spec.host on the source itself
//!     binding.octopilot.io/spec.host: binding:env:attribute
//! ```
//!
//! The key after the prefix is `<fieldPath>[-<sourceKey>]`; the value is the tag
//! that selects a handler.

use crate::constants::SOURCE_KEY_SEPARATOR;
use crate::error::BindingError;
use kube::core::DynamicObject;
use std::fmt;

/// Dotted path into a resource, e.g. `status.dbCredentials`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Parse a dotted path; every segment must be non-empty
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return None;
        }
        Some(Self(segments))
    }

    /// Final segment, used as the default payload key
    #[must_use]
    pub fn last(&self) -> &str {
        self.0.last().map_or("", String::as_str)
    }

    /// Walk the path through a JSON value
    #[must_use]
    pub fn lookup<'a>(&self, value: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
        self.0
            .iter()
            .try_fold(value, |current, segment| current.get(segment))
    }

    /// Walk the path through a dynamic object, metadata included
    #[must_use]
    pub fn lookup_in(&self, object: &DynamicObject) -> Option<serde_json::Value> {
        match self.0.split_first() {
            Some((head, rest)) if head == "metadata" => {
                let metadata = serde_json::to_value(&object.metadata).ok()?;
                FieldPath(rest.to_vec()).lookup(&metadata).cloned()
            }
            _ => self.lookup(&object.data).cloned(),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// One binding annotation, parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDeclaration {
    /// Full annotation key, kept for diagnostics
    pub annotation: String,
    /// Annotation value selecting the handler
    pub tag: String,
    /// Field on the source resource the binding starts from
    pub path: FieldPath,
    /// Key (or field path, for generic resources) to extract from the target
    pub source_key: Option<String>,
}

impl BindingDeclaration {
    /// Parse one annotation.
    ///
    /// Returns `None` when the key does not carry the binding prefix.
    pub fn parse(key: &str, value: &str, prefix: &str) -> Option<Result<Self, BindingError>> {
        let rest = key.strip_prefix(prefix)?;
        Some(Self::parse_binding(key, rest, value))
    }

    fn parse_binding(key: &str, rest: &str, value: &str) -> Result<Self, BindingError> {
        let tag = value.trim();
        if tag.is_empty() {
            return Err(BindingError::malformed(key, "empty tag"));
        }

        let (path, source_key) = match rest.split_once(SOURCE_KEY_SEPARATOR) {
            Some((path, source_key)) => {
                if source_key.is_empty() {
                    return Err(BindingError::malformed(key, "empty source key after '-'"));
                }
                (path, Some(source_key.to_string()))
            }
            None => (rest, None),
        };

        let path = FieldPath::parse(path)
            .ok_or_else(|| BindingError::malformed(key, format!("invalid field path '{path}'")))?;

        Ok(Self {
            annotation: key.to_string(),
            tag: tag.to_string(),
            path,
            source_key,
        })
    }
}

/// Parse every binding annotation, preserving the order the annotations are given in.
///
/// Malformed entries are returned as errors in place so the caller can report them
/// without losing the position of the well-formed ones.
pub fn parse_declarations<'a, I>(annotations: I, prefix: &str) -> Vec<Result<BindingDeclaration, BindingError>>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    annotations
        .into_iter()
        .filter_map(|(key, value)| BindingDeclaration::parse(key, value, prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_ANNOTATION_PREFIX, SECRET_TAG};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn parse(key: &str, value: &str) -> Option<Result<BindingDeclaration, BindingError>> {
        BindingDeclaration::parse(key, value, DEFAULT_ANNOTATION_PREFIX)
    }

    #[test]
    fn test_parse_path_only() {
        let decl = parse("binding.octopilot.io/spec.dbCredentials", SECRET_TAG)
            .expect("prefixed")
            .expect("valid");
        assert_eq!(decl.tag, SECRET_TAG);
        assert_eq!(decl.path.to_string(), "spec.dbCredentials");
        assert_eq!(decl.source_key, None);
    }

    #[test]
    fn test_parse_with_source_key() {
        let decl = parse("binding.octopilot.io/status.ref-status.host", " binding:env:attribute ")
            .expect("prefixed")
            .expect("valid");
        assert_eq!(decl.path.to_string(), "status.ref");
        assert_eq!(decl.source_key.as_deref(), Some("status.host"));
        assert_eq!(decl.tag, "binding:env:attribute");
    }

    #[test]
    fn test_unprefixed_annotation_ignored() {
        assert!(parse("kubectl.kubernetes.io/last-applied-configuration", "{}").is_none());
    }

    #[test]
    fn test_malformed_annotations() {
        for (key, value) in [
            ("binding.octopilot.io/spec.db", ""),
            ("binding.octopilot.io/spec..db", SECRET_TAG),
            ("binding.octopilot.io/", SECRET_TAG),
            ("binding.octopilot.io/spec.db-", SECRET_TAG),
        ] {
            let result = parse(key, value).expect("prefixed");
            assert!(
                matches!(result, Err(BindingError::Malformed { .. })),
                "{key}={value} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_declarations_preserves_order() {
        let annotations = BTreeMap::from([
            ("binding.octopilot.io/a".to_string(), SECRET_TAG.to_string()),
            ("binding.octopilot.io/b".to_string(), SECRET_TAG.to_string()),
            ("other/c".to_string(), SECRET_TAG.to_string()),
            ("binding.octopilot.io/c".to_string(), SECRET_TAG.to_string()),
        ]);
        let paths: Vec<String> = parse_declarations(&annotations, DEFAULT_ANNOTATION_PREFIX)
            .into_iter()
            .map(|d| d.expect("valid").path.to_string())
            .collect();
        assert_eq!(paths, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_field_path_lookup() {
        let path = FieldPath::parse("status.db.host").expect("valid");
        let value = json!({"status": {"db": {"host": "pg.local"}}});
        assert_eq!(path.lookup(&value), Some(&json!("pg.local")));
        assert_eq!(path.last(), "host");

        let missing = FieldPath::parse("status.cache").expect("valid");
        assert_eq!(missing.lookup(&value), None);
    }

    #[test]
    fn test_field_path_metadata_lookup() {
        let mut object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "example.com/v1",
            "kind": "Database",
            "metadata": {"name": "db", "namespace": "apps"},
            "spec": {"size": 3}
        }))
        .expect("valid object");
        object.metadata.labels = Some(BTreeMap::from([("tier".to_string(), "data".to_string())]));

        let name = FieldPath::parse("metadata.name").expect("valid");
        assert_eq!(name.lookup_in(&object), Some(json!("db")));
        let size = FieldPath::parse("spec.size").expect("valid");
        assert_eq!(size.lookup_in(&object), Some(json!(3)));
    }
}
