//! Reads a field from the source resource itself.
//!
//! Scalars and sequences become one entry keyed by the source key (or the last path
//! segment). A mapping is flattened one level into `<key>_<child>` entries.

use super::{describe, field_bytes, source_namespace, Extract};
use crate::binding::declaration::{BindingDeclaration, FieldPath};
use crate::binding::payload::Fragment;
use crate::error::BindingError;
use async_trait::async_trait;
use kube::core::DynamicObject;
use tracing::debug;

#[derive(Debug)]
pub struct AttributeHandler {
    source: DynamicObject,
    path: FieldPath,
    key: String,
}

impl AttributeHandler {
    pub fn new(declaration: &BindingDeclaration, source: &DynamicObject) -> Result<Self, BindingError> {
        source_namespace(declaration, source)?;
        let key = declaration
            .source_key
            .clone()
            .unwrap_or_else(|| declaration.path.last().to_string());
        Ok(Self {
            source: source.clone(),
            path: declaration.path.clone(),
            key,
        })
    }
}

#[async_trait]
impl Extract for AttributeHandler {
    async fn extract(&self) -> Result<Fragment, BindingError> {
        debug!(field = %self.path, key = %self.key, "Reading attribute");
        let value = self.path.lookup_in(&self.source).ok_or_else(|| {
            BindingError::NotFound(format!("field '{}' on {}", self.path, describe(&self.source)))
        })?;

        let fragment = match &value {
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(child, v)| (format!("{}_{child}", self.key), field_bytes(v)))
                .collect(),
            other => Fragment::from([(self.key.clone(), field_bytes(other))]),
        };
        Ok(fragment)
    }
}
