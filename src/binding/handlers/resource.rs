//! Reads one field from an arbitrary resource referenced by the source resource.
//!
//! The target kind comes from the tag (`binding:env:object:resource:<group>/<version>/<Kind>`,
//! core group written as `/v1/Kind` or `v1/Kind`), the field from the source key.

use super::{describe, field_bytes, Extract, ObjectRef};
use crate::binding::declaration::{BindingDeclaration, FieldPath};
use crate::binding::payload::Fragment;
use crate::client::ResourceClient;
use crate::constants::RESOURCE_TAG_PREFIX;
use crate::error::BindingError;
use async_trait::async_trait;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use std::sync::Arc;
use tracing::debug;

pub struct ResourceHandler {
    client: Arc<dyn ResourceClient>,
    resource: ApiResource,
    target: ObjectRef,
    field: FieldPath,
}

impl std::fmt::Debug for ResourceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandler")
            .field("kind", &self.resource.kind)
            .field("target", &self.target)
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

/// Parse `<group>/<version>/<Kind>` or `<version>/<Kind>`
pub fn parse_gvk(spec: &str) -> Option<GroupVersionKind> {
    let parts: Vec<&str> = spec.split('/').collect();
    let (group, version, kind) = match parts.as_slice() {
        [group, version, kind] => (*group, *version, *kind),
        [version, kind] => ("", *version, *kind),
        _ => return None,
    };
    if version.is_empty() || kind.is_empty() {
        return None;
    }
    Some(GroupVersionKind::gvk(group, version, kind))
}

impl ResourceHandler {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        declaration: &BindingDeclaration,
        source: &DynamicObject,
    ) -> Result<Self, BindingError> {
        let annotation = declaration.annotation.as_str();

        let gvk_spec = declaration
            .tag
            .strip_prefix(RESOURCE_TAG_PREFIX)
            .unwrap_or_default();
        let gvk = parse_gvk(gvk_spec).ok_or_else(|| {
            BindingError::malformed(
                annotation,
                format!("'{gvk_spec}' is not <group>/<version>/<Kind>"),
            )
        })?;

        let field = declaration
            .source_key
            .as_deref()
            .ok_or_else(|| {
                BindingError::malformed(annotation, "resource bindings need a field path after '-'")
            })
            .and_then(|key| {
                FieldPath::parse(key).ok_or_else(|| {
                    BindingError::malformed(annotation, format!("invalid field path '{key}'"))
                })
            })?;

        Ok(Self {
            client,
            resource: ApiResource::from_gvk(&gvk),
            target: ObjectRef::from_source(declaration, source)?,
            field,
        })
    }
}

#[async_trait]
impl Extract for ResourceHandler {
    async fn extract(&self) -> Result<Fragment, BindingError> {
        debug!(
            kind = %self.resource.kind,
            namespace = %self.target.namespace,
            name = %self.target.name,
            field = %self.field,
            "Reading resource field"
        );
        let object = self
            .client
            .get(&self.resource, &self.target.namespace, &self.target.name)
            .await?;

        let value = self.field.lookup_in(&object).ok_or_else(|| {
            BindingError::NotFound(format!("field '{}' on {}", self.field, describe(&object)))
        })?;

        Ok(Fragment::from([(
            self.field.last().to_string(),
            field_bytes(&value),
        )]))
    }
}
