//! Reads keys from a Secret referenced by the source resource.

use super::{select, Extract, ObjectRef};
use crate::binding::declaration::BindingDeclaration;
use crate::binding::payload::Fragment;
use crate::client::{secret_resource, ResourceClient};
use crate::error::BindingError;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use kube::core::DynamicObject;
use std::sync::Arc;
use tracing::debug;

pub struct SecretHandler {
    client: Arc<dyn ResourceClient>,
    target: ObjectRef,
    source_key: Option<String>,
}

impl std::fmt::Debug for SecretHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretHandler")
            .field("target", &self.target)
            .field("source_key", &self.source_key)
            .finish_non_exhaustive()
    }
}

impl SecretHandler {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        declaration: &BindingDeclaration,
        source: &DynamicObject,
    ) -> Result<Self, BindingError> {
        Ok(Self {
            client,
            target: ObjectRef::from_source(declaration, source)?,
            source_key: declaration.source_key.clone(),
        })
    }
}

/// Decode the base64 `data` of a persisted Secret
pub(crate) fn decode_secret_data(object: &DynamicObject) -> Result<Fragment, BindingError> {
    let Some(data) = object.data.get("data").and_then(serde_json::Value::as_object) else {
        return Ok(Fragment::new());
    };

    data.iter()
        .map(|(key, value)| {
            let encoded = value.as_str().unwrap_or_default();
            general_purpose::STANDARD
                .decode(encoded)
                .map(|bytes| (key.clone(), bytes))
                .map_err(|e| BindingError::Serialization(format!("Secret key '{key}': {e}")))
        })
        .collect()
}

#[async_trait]
impl Extract for SecretHandler {
    async fn extract(&self) -> Result<Fragment, BindingError> {
        debug!(
            namespace = %self.target.namespace,
            name = %self.target.name,
            key = ?self.source_key,
            "Reading Secret"
        );
        let secret = self
            .client
            .get(&secret_resource(), &self.target.namespace, &self.target.name)
            .await?;

        let entries = decode_secret_data(&secret)?;
        select(entries, self.source_key.as_deref(), || {
            format!("Secret {}", self.target)
        })
    }
}
