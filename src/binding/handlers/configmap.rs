//! Reads keys from a ConfigMap referenced by the source resource.
//!
//! Both `data` (plain text) and `binaryData` (base64) entries are returned as bytes.

use super::{select, Extract, ObjectRef};
use crate::binding::declaration::BindingDeclaration;
use crate::binding::payload::Fragment;
use crate::client::{configmap_resource, ResourceClient};
use crate::error::BindingError;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use kube::core::DynamicObject;
use std::sync::Arc;
use tracing::debug;

pub struct ConfigMapHandler {
    client: Arc<dyn ResourceClient>,
    target: ObjectRef,
    source_key: Option<String>,
}

impl std::fmt::Debug for ConfigMapHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigMapHandler")
            .field("target", &self.target)
            .field("source_key", &self.source_key)
            .finish_non_exhaustive()
    }
}

impl ConfigMapHandler {
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

fn configmap_entries(object: &DynamicObject) -> Result<Fragment, BindingError> {
    let mut entries = Fragment::new();

    if let Some(data) = object.data.get("data").and_then(serde_json::Value::as_object) {
        for (key, value) in data {
            let text = value.as_str().unwrap_or_default();
            entries.insert(key.clone(), text.as_bytes().to_vec());
        }
    }

    if let Some(binary) = object
        .data
        .get("binaryData")
        .and_then(serde_json::Value::as_object)
    {
        for (key, value) in binary {
            let bytes = general_purpose::STANDARD
                .decode(value.as_str().unwrap_or_default())
                .map_err(|e| BindingError::Serialization(format!("ConfigMap key '{key}': {e}")))?;
            entries.insert(key.clone(), bytes);
        }
    }

    Ok(entries)
}

#[async_trait]
impl Extract for ConfigMapHandler {
    async fn extract(&self) -> Result<Fragment, BindingError> {
        debug!(
            namespace = %self.target.namespace,
            name = %self.target.name,
            key = ?self.source_key,
            "Reading ConfigMap"
        );
        let configmap = self
            .client
            .get(&configmap_resource(), &self.target.namespace, &self.target.name)
            .await?;

        let entries = configmap_entries(&configmap)?;
        select(entries, self.source_key.as_deref(), || {
            format!("ConfigMap {}", self.target)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::handlers::tests::{declaration, source};
    use crate::client::memory::InMemoryClient;
    use crate::constants::CONFIGMAP_TAG;
    use serde_json::json;

    fn client_with_configmap() -> Arc<InMemoryClient> {
        let client = Arc::new(InMemoryClient::new());
        let configmap: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "db-config", "namespace": "apps"},
            "data": {"host": "pg.apps.svc", "port": "5432"},
            // 0x01 0x02
            "binaryData": {"cert": "AQI="}
        }))
        .expect("valid configmap");
        client.insert(&configmap_resource(), configmap);
        client
    }

    #[tokio::test]
    async fn test_extract_data_and_binary_data() {
        let handler = ConfigMapHandler::new(
            client_with_configmap(),
            &declaration("status.configRef", CONFIGMAP_TAG),
            &source(json!({})),
        );
        // status not populated yet
        assert!(matches!(handler, Err(BindingError::NotFound(_))));

        let handler = ConfigMapHandler::new(
            client_with_configmap(),
            &declaration("spec.configRef", CONFIGMAP_TAG),
            &source(json!({"configRef": "db-config"})),
        )
        .expect("handler");
        let fragment = handler.extract().await.expect("extract");

        assert_eq!(fragment.get("host"), Some(&b"pg.apps.svc".to_vec()));
        assert_eq!(fragment.get("port"), Some(&b"5432".to_vec()));
        assert_eq!(fragment.get("cert"), Some(&vec![1u8, 2u8]));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let handler = ConfigMapHandler::new(
            client_with_configmap(),
            &declaration("spec.configRef-user", CONFIGMAP_TAG),
            &source(json!({"configRef": "db-config"})),
        )
        .expect("handler");

        let err = handler.extract().await.expect_err("missing key");
        assert!(matches!(err, BindingError::NotFound(ref what) if what.contains("user")));
    }

    #[tokio::test]
    async fn test_missing_configmap_is_not_found() {
        let handler = ConfigMapHandler::new(
            Arc::new(InMemoryClient::new()),
            &declaration("spec.configRef", CONFIGMAP_TAG),
            &source(json!({"configRef": "db-config"})),
        )
        .expect("handler");

        assert!(matches!(
            handler.extract().await,
            Err(BindingError::NotFound(_))
        ));
    }
}
