//! # Handler Registry & Dispatch
//!
//! Maps a binding tag to the handler that extracts data for it.
//!
//! The set of handlers is closed: each [`HandlerKind`] has exactly one entry in
//! [`REGISTRY`], a static table that is never mutated after compilation. Dispatch is a
//! linear scan over the table by tag.
//!
//! | Tag                                            | Handler            |
//! |------------------------------------------------|--------------------|
//! | `binding:env:object:secret`                    | [`SecretHandler`]    |
//! | `binding:env:object:configmap`                 | [`ConfigMapHandler`] |
//! | `binding:env:object:resource:<group>/<v>/<Kind>` | [`ResourceHandler`]  |
//! | `binding:env:attribute`                        | [`AttributeHandler`] |

use crate::binding::declaration::BindingDeclaration;
use crate::binding::payload::Fragment;
use crate::client::ResourceClient;
use crate::constants::{ATTRIBUTE_TAG, CONFIGMAP_TAG, RESOURCE_TAG_PREFIX, SECRET_TAG};
use crate::error::BindingError;
use async_trait::async_trait;
use kube::core::DynamicObject;
use std::fmt;
use std::sync::Arc;

mod attribute;
mod configmap;
mod resource;
mod secret;

pub use attribute::AttributeHandler;
pub use configmap::ConfigMapHandler;
pub use resource::{parse_gvk, ResourceHandler};
pub use secret::SecretHandler;

/// Extraction capability shared by all handlers
///
/// Handlers never cache: every call re-reads the current state of the target.
#[async_trait]
pub trait Extract: Send + Sync {
    async fn extract(&self) -> Result<Fragment, BindingError>;
}

/// Supported handler variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Secret,
    ConfigMap,
    Resource,
    Attribute,
}

impl HandlerKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerKind::Secret => "secret",
            HandlerKind::ConfigMap => "configmap",
            HandlerKind::Resource => "resource",
            HandlerKind::Attribute => "attribute",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handler bound to one declaration and one target
#[derive(Debug)]
pub enum Handler {
    Secret(SecretHandler),
    ConfigMap(ConfigMapHandler),
    Resource(ResourceHandler),
    Attribute(AttributeHandler),
}

impl Handler {
    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        match self {
            Handler::Secret(_) => HandlerKind::Secret,
            Handler::ConfigMap(_) => HandlerKind::ConfigMap,
            Handler::Resource(_) => HandlerKind::Resource,
            Handler::Attribute(_) => HandlerKind::Attribute,
        }
    }
}

#[async_trait]
impl Extract for Handler {
    async fn extract(&self) -> Result<Fragment, BindingError> {
        match self {
            Handler::Secret(h) => h.extract().await,
            Handler::ConfigMap(h) => h.extract().await,
            Handler::Resource(h) => h.extract().await,
            Handler::Attribute(h) => h.extract().await,
        }
    }
}

type Factory =
    fn(Arc<dyn ResourceClient>, &BindingDeclaration, &DynamicObject) -> Result<Handler, BindingError>;

/// One row of the dispatch table
pub struct Registration {
    pub kind: HandlerKind,
    pub classify: fn(&str) -> bool,
    factory: Factory,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[must_use]
pub fn is_secret(tag: &str) -> bool {
    tag == SECRET_TAG
}

#[must_use]
pub fn is_configmap(tag: &str) -> bool {
    tag == CONFIGMAP_TAG
}

#[must_use]
pub fn is_resource(tag: &str) -> bool {
    tag.starts_with(RESOURCE_TAG_PREFIX)
}

#[must_use]
pub fn is_attribute(tag: &str) -> bool {
    tag == ATTRIBUTE_TAG
}

fn build_secret(
    client: Arc<dyn ResourceClient>,
    declaration: &BindingDeclaration,
    source: &DynamicObject,
) -> Result<Handler, BindingError> {
    SecretHandler::new(client, declaration, source).map(Handler::Secret)
}

fn build_configmap(
    client: Arc<dyn ResourceClient>,
    declaration: &BindingDeclaration,
    source: &DynamicObject,
) -> Result<Handler, BindingError> {
    ConfigMapHandler::new(client, declaration, source).map(Handler::ConfigMap)
}

fn build_resource(
    client: Arc<dyn ResourceClient>,
    declaration: &BindingDeclaration,
    source: &DynamicObject,
) -> Result<Handler, BindingError> {
    ResourceHandler::new(client, declaration, source).map(Handler::Resource)
}

fn build_attribute(
    _client: Arc<dyn ResourceClient>,
    declaration: &BindingDeclaration,
    source: &DynamicObject,
) -> Result<Handler, BindingError> {
    AttributeHandler::new(declaration, source).map(Handler::Attribute)
}

/// Process-wide dispatch table
pub static REGISTRY: [Registration; 4] = [
    Registration {
        kind: HandlerKind::Secret,
        classify: is_secret,
        factory: build_secret,
    },
    Registration {
        kind: HandlerKind::ConfigMap,
        classify: is_configmap,
        factory: build_configmap,
    },
    Registration {
        kind: HandlerKind::Resource,
        classify: is_resource,
        factory: build_resource,
    },
    Registration {
        kind: HandlerKind::Attribute,
        classify: is_attribute,
        factory: build_attribute,
    },
];

/// Find the handler kind for a tag
#[must_use]
pub fn classify(tag: &str) -> Option<HandlerKind> {
    REGISTRY
        .iter()
        .find(|r| (r.classify)(tag))
        .map(|r| r.kind)
}

/// Build the handler for a declaration.
///
/// Fails with [`BindingError::NoHandler`] for unknown tags and with
/// [`BindingError::Malformed`] when the declaration's coordinates are invalid.
pub fn new_handler(
    client: Arc<dyn ResourceClient>,
    declaration: &BindingDeclaration,
    source: &DynamicObject,
) -> Result<Handler, BindingError> {
    let registration = REGISTRY
        .iter()
        .find(|r| (r.classify)(&declaration.tag))
        .ok_or_else(|| BindingError::NoHandler {
            annotation: declaration.annotation.clone(),
            tag: declaration.tag.clone(),
        })?;
    (registration.factory)(client, declaration, source)
}

/// Namespaced object named by a field on the source resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl ObjectRef {
    /// Resolve the object referenced by `declaration.path` on `source`.
    ///
    /// The field may hold a name (the source's namespace is used) or an object with
    /// `name` and optional `namespace`. A missing field is `NotFound`, since status
    /// fields are often filled in after the source is created; a present but
    /// unusable field is `Malformed`.
    pub fn from_source(
        declaration: &BindingDeclaration,
        source: &DynamicObject,
    ) -> Result<Self, BindingError> {
        let annotation = declaration.annotation.as_str();
        let source_namespace = source_namespace(declaration, source)?;

        let field = declaration.path.lookup_in(source).ok_or_else(|| {
            BindingError::NotFound(format!(
                "field '{}' on {}",
                declaration.path,
                describe(source)
            ))
        })?;

        let (name, namespace) = match &field {
            serde_json::Value::String(name) => (name.clone(), source_namespace),
            serde_json::Value::Object(map) => {
                let name = map
                    .get("name")
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| {
                        BindingError::malformed(
                            annotation,
                            format!("field '{}' has no string 'name'", declaration.path),
                        )
                    })?;
                let namespace = map
                    .get("namespace")
                    .and_then(serde_json::Value::as_str)
                    .map_or(source_namespace, str::to_string);
                (name.to_string(), namespace)
            }
            other => {
                return Err(BindingError::malformed(
                    annotation,
                    format!(
                        "field '{}' must be a name or an object reference, got {other}",
                        declaration.path
                    ),
                ))
            }
        };

        if !is_valid_object_name(&name) {
            return Err(BindingError::malformed(
                annotation,
                format!("'{name}' is not a valid object name"),
            ));
        }
        if !is_valid_object_name(&namespace) {
            return Err(BindingError::malformed(
                annotation,
                format!("'{namespace}' is not a valid namespace"),
            ));
        }

        Ok(Self { namespace, name })
    }
}

pub(crate) fn source_namespace(
    declaration: &BindingDeclaration,
    source: &DynamicObject,
) -> Result<String, BindingError> {
    source
        .metadata
        .namespace
        .clone()
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| BindingError::malformed(&declaration.annotation, "source resource has no namespace"))
}

pub(crate) fn describe(object: &DynamicObject) -> String {
    let kind = object
        .types
        .as_ref()
        .map_or("object", |t| t.kind.as_str());
    format!(
        "{kind} {}/{}",
        object.metadata.namespace.as_deref().unwrap_or_default(),
        object.metadata.name.as_deref().unwrap_or_default()
    )
}

/// DNS-1123 subdomain check used for object names and namespaces
#[must_use]
pub fn is_valid_object_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    !name.is_empty()
        && name.len() <= crate::constants::MAX_OBJECT_NAME_LENGTH
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-' || *b == b'.')
        && bytes.first().is_some_and(u8::is_ascii_alphanumeric)
        && bytes.last().is_some_and(u8::is_ascii_alphanumeric)
}

/// Keep only `source_key` when given, failing if it is absent
pub(crate) fn select(
    entries: Fragment,
    source_key: Option<&str>,
    what: impl FnOnce() -> String,
) -> Result<Fragment, BindingError> {
    match source_key {
        None => Ok(entries),
        Some(key) => {
            let mut entries = entries;
            entries
                .remove_entry(key)
                .map(|entry| Fragment::from([entry]))
                .ok_or_else(|| BindingError::NotFound(format!("key '{key}' in {}", what())))
        }
    }
}

/// Text form of a JSON field value: strings verbatim, everything else as JSON
pub(crate) fn field_bytes(value: &serde_json::Value) -> Vec<u8> {
    match value {
        serde_json::Value::String(s) => s.as_bytes().to_vec(),
        other => other.to_string().into_bytes(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::memory::InMemoryClient;
    use crate::constants::DEFAULT_ANNOTATION_PREFIX;
    use serde_json::json;

    pub(crate) fn source(spec: serde_json::Value) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "example.com/v1",
            "kind": "Database",
            "metadata": {"name": "orders-db", "namespace": "apps", "uid": "1234"},
            "spec": spec,
        }))
        .expect("valid source")
    }

    pub(crate) fn declaration(key: &str, tag: &str) -> BindingDeclaration {
        BindingDeclaration::parse(
            &format!("{DEFAULT_ANNOTATION_PREFIX}{key}"),
            tag,
            DEFAULT_ANNOTATION_PREFIX,
        )
        .expect("prefixed")
        .expect("valid")
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(SECRET_TAG), Some(HandlerKind::Secret));
        assert_eq!(classify(CONFIGMAP_TAG), Some(HandlerKind::ConfigMap));
        assert_eq!(
            classify("binding:env:object:resource:apps/v1/Deployment"),
            Some(HandlerKind::Resource)
        );
        assert_eq!(classify(ATTRIBUTE_TAG), Some(HandlerKind::Attribute));
        assert_eq!(classify("binding:env:object:vault"), None);
    }

    #[test]
    fn test_new_handler_unknown_tag() {
        let client: Arc<dyn ResourceClient> = Arc::new(InMemoryClient::new());
        let decl = declaration("spec.creds", "binding:env:object:vault");
        let err = new_handler(client, &decl, &source(json!({"creds": "db"}))).expect_err("unknown");
        assert!(matches!(err, BindingError::NoHandler { .. }));
    }

    #[test]
    fn test_new_handler_dispatches_by_tag() {
        let client: Arc<dyn ResourceClient> = Arc::new(InMemoryClient::new());
        let src = source(json!({"creds": "db", "host": "pg"}));

        let secret = new_handler(client.clone(), &declaration("spec.creds", SECRET_TAG), &src)
            .expect("secret handler");
        assert_eq!(secret.kind(), HandlerKind::Secret);

        let attribute = new_handler(client, &declaration("spec.host", ATTRIBUTE_TAG), &src)
            .expect("attribute handler");
        assert_eq!(attribute.kind(), HandlerKind::Attribute);
    }

    #[test]
    fn test_object_ref_from_name_and_object() {
        let decl = declaration("spec.creds", SECRET_TAG);
        let by_name = ObjectRef::from_source(&decl, &source(json!({"creds": "db-creds"})))
            .expect("name reference");
        assert_eq!(by_name.to_string(), "apps/db-creds");

        let by_object = ObjectRef::from_source(
            &decl,
            &source(json!({"creds": {"name": "shared", "namespace": "infra"}})),
        )
        .expect("object reference");
        assert_eq!(by_object.to_string(), "infra/shared");
    }

    #[test]
    fn test_object_ref_errors() {
        let decl = declaration("spec.creds", SECRET_TAG);

        let missing = ObjectRef::from_source(&decl, &source(json!({}))).expect_err("missing");
        assert!(matches!(missing, BindingError::NotFound(_)));

        let invalid = ObjectRef::from_source(&decl, &source(json!({"creds": "Not_Valid"})))
            .expect_err("invalid name");
        assert!(matches!(invalid, BindingError::Malformed { .. }));

        let wrong_type =
            ObjectRef::from_source(&decl, &source(json!({"creds": 42}))).expect_err("number");
        assert!(matches!(wrong_type, BindingError::Malformed { .. }));
    }

    #[test]
    fn test_is_valid_object_name() {
        assert!(is_valid_object_name("db-creds.v1"));
        assert!(!is_valid_object_name(""));
        assert!(!is_valid_object_name("-db"));
        assert!(!is_valid_object_name("db-"));
        assert!(!is_valid_object_name("DB"));
        assert!(!is_valid_object_name(&"a".repeat(254)));
    }

    #[test]
    fn test_select() {
        let entries = Fragment::from([
            ("user".to_string(), b"admin".to_vec()),
            ("password".to_string(), b"pw".to_vec()),
        ]);
        let all = select(entries.clone(), None, String::new).expect("all keys");
        assert_eq!(all.len(), 2);

        let one = select(entries.clone(), Some("user"), String::new).expect("one key");
        assert_eq!(one, Fragment::from([("user".to_string(), b"admin".to_vec())]));

        let missing = select(entries, Some("token"), || "Secret apps/db".to_string())
            .expect_err("absent key");
        assert!(matches!(missing, BindingError::NotFound(_)));
    }
}
