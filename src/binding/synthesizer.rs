//! # Secret Synthesizer
//!
//! Materializes a payload as a content-addressed Secret named `<base>-<fingerprint>`.
//!
//! Equal payloads always map to the same name, so finding an object under that name
//! proves it already holds the payload and no deep comparison is needed. A create that
//! loses a race against another pass is reported as `created == false`.
//!
//! [`SecretSynthesizer::is_same`] covers Secrets whose name is fixed rather than derived
//! from content, using the structural comparator.

use crate::binding::comparator::{compare, ComparisonMode, ComparisonResult, MismatchReason, Value};
use crate::binding::fingerprint::{derived_name, fingerprint};
use crate::binding::handlers::{describe, is_valid_object_name};
use crate::binding::payload::Payload;
use crate::client::{secret_resource, ResourceClient};
use crate::constants::{FINGERPRINT_ANNOTATION, MANAGED_BY_LABEL, MANAGED_BY_VALUE};
use crate::error::{BindingError, ClientError};
use crate::observability::metrics;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::core::DynamicObject;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything known about one derived Secret
#[derive(Debug, Clone, PartialEq)]
pub struct SecretDescriptor {
    pub namespace: String,
    pub base_name: String,
    /// `<base_name>-<fingerprint>`, base truncated to fit the name limit
    pub name: String,
    pub fingerprint: String,
    pub payload: Payload,
    pub owner_reference: Option<OwnerReference>,
}

impl SecretDescriptor {
    #[must_use]
    pub fn new(
        namespace: &str,
        base_name: &str,
        payload: Payload,
        owner_reference: Option<OwnerReference>,
    ) -> Self {
        let fingerprint = fingerprint(&payload);
        Self {
            namespace: namespace.to_string(),
            base_name: base_name.to_string(),
            name: derived_name(base_name, &fingerprint),
            fingerprint,
            payload,
            owner_reference,
        }
    }

    /// The Secret this descriptor stands for
    #[must_use]
    pub fn to_secret(&self) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(BTreeMap::from([(
                    MANAGED_BY_LABEL.to_string(),
                    MANAGED_BY_VALUE.to_string(),
                )])),
                annotations: Some(BTreeMap::from([(
                    FINGERPRINT_ANNOTATION.to_string(),
                    self.fingerprint.clone(),
                )])),
                owner_references: self.owner_reference.clone().map(|owner| vec![owner]),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            data: Some(self.payload.to_secret_data()),
            ..Default::default()
        }
    }

    /// Dynamic form handed to the resource client
    pub fn to_dynamic(&self) -> Result<DynamicObject, BindingError> {
        let value = serde_json::to_value(self.to_secret())?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Result of [`SecretSynthesizer::synthesize`]
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    pub descriptor: SecretDescriptor,
    /// False when the Secret already existed
    pub created: bool,
}

/// Build a controller owner reference pointing at `source`
pub fn owner_reference_for(source: &DynamicObject) -> Result<OwnerReference, BindingError> {
    let what = describe(source);
    let types = source
        .types
        .as_ref()
        .ok_or_else(|| BindingError::malformed(&what, "source has no apiVersion/kind"))?;
    let name = source
        .metadata
        .name
        .clone()
        .ok_or_else(|| BindingError::malformed(&what, "source has no name"))?;
    let uid = source
        .metadata
        .uid
        .clone()
        .ok_or_else(|| BindingError::malformed(&what, "source has no uid"))?;

    Ok(OwnerReference {
        api_version: types.api_version.clone(),
        kind: types.kind.clone(),
        name,
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

/// Creates, compares and deletes derived Secrets
pub struct SecretSynthesizer {
    client: Arc<dyn ResourceClient>,
    mode: ComparisonMode,
}

impl std::fmt::Debug for SecretSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretSynthesizer")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl SecretSynthesizer {
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>, mode: ComparisonMode) -> Self {
        Self { client, mode }
    }

    /// Ensure the content-addressed Secret for `payload` exists.
    ///
    /// A base name that cannot form a valid object name is `Malformed`. Errors other
    /// than not-found on the lookup are returned unchanged.
    pub async fn synthesize(
        &self,
        namespace: &str,
        base_name: &str,
        payload: &Payload,
        owner_reference: Option<OwnerReference>,
    ) -> Result<Synthesized, BindingError> {
        let descriptor = SecretDescriptor::new(namespace, base_name, payload.clone(), owner_reference);
        if !is_valid_object_name(&descriptor.name) {
            return Err(BindingError::malformed(
                base_name,
                "base name must be lowercase alphanumerics, '-' or '.'",
            ));
        }
        let resource = secret_resource();

        match self.client.get(&resource, namespace, &descriptor.name).await {
            Ok(_) => {
                debug!(namespace, name = %descriptor.name, "Derived Secret already present");
                metrics::increment_secrets_unchanged();
                return Ok(Synthesized {
                    descriptor,
                    created: false,
                });
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let object = descriptor.to_dynamic()?;
        match self.client.create(&resource, namespace, &object).await {
            Ok(_) => {
                info!(
                    namespace,
                    name = %descriptor.name,
                    keys = descriptor.payload.len(),
                    "Created derived Secret"
                );
                metrics::increment_secrets_created();
                Ok(Synthesized {
                    descriptor,
                    created: true,
                })
            }
            Err(ClientError::AlreadyExists { .. }) => {
                debug!(namespace, name = %descriptor.name, "Derived Secret created concurrently");
                metrics::increment_secrets_unchanged();
                Ok(Synthesized {
                    descriptor,
                    created: false,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Compare the Secret `name` against `payload` using the configured mode.
    ///
    /// A missing Secret is a failed comparison, not an error.
    pub async fn is_same(
        &self,
        namespace: &str,
        name: &str,
        payload: &Payload,
    ) -> Result<ComparisonResult, BindingError> {
        let existing = match self.client.get(&secret_resource(), namespace, name).await {
            Ok(object) => object,
            Err(err) if err.is_not_found() => {
                return Ok(ComparisonResult::differs("", MismatchReason::Absent));
            }
            Err(err) => return Err(err.into()),
        };

        let existing = existing
            .data
            .get("data")
            .filter(|data| !data.is_null())
            .map_or_else(|| Value::Mapping(BTreeMap::new()), Value::from);
        let result = compare(&existing, &Value::from_payload(payload), self.mode);
        if let Some(mismatch) = &result.mismatch {
            debug!(namespace, name, "Secret differs: {}", mismatch);
        }
        Ok(result)
    }

    /// Delete a derived Secret. Returns whether anything was deleted.
    pub async fn delete(&self, namespace: &str, name: &str) -> Result<bool, BindingError> {
        match self.client.delete(&secret_resource(), namespace, name).await {
            Ok(()) => {
                info!(namespace, name, "Deleted derived Secret");
                metrics::increment_secrets_deleted();
                Ok(true)
            }
            Err(err) if err.is_not_found() => {
                debug!(namespace, name, "Derived Secret already gone");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::fingerprint::FINGERPRINT_LENGTH;
    use crate::client::memory::InMemoryClient;
    use serde_json::json;

    fn payload() -> Payload {
        [("username", "admin"), ("password", "hunter2")]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_descriptor_name_and_secret() {
        let descriptor = SecretDescriptor::new("apps", "orders-db", payload(), None);
        assert_eq!(descriptor.name, format!("orders-db-{}", descriptor.fingerprint));
        assert_eq!(descriptor.fingerprint.len(), FINGERPRINT_LENGTH);

        let secret = descriptor.to_secret();
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        let labels = secret.metadata.labels.expect("labels");
        assert_eq!(labels.get(MANAGED_BY_LABEL).map(String::as_str), Some(MANAGED_BY_VALUE));
        let data = secret.data.expect("data");
        assert_eq!(data.get("password").map(|b| b.0.as_slice()), Some(b"hunter2".as_slice()));
    }

    #[test]
    fn test_owner_reference_for() {
        let source: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "example.com/v1",
            "kind": "Database",
            "metadata": {"name": "orders-db", "namespace": "apps", "uid": "1234"},
        }))
        .expect("valid source");
        let owner = owner_reference_for(&source).expect("owner");
        assert_eq!(owner.api_version, "example.com/v1");
        assert_eq!(owner.kind, "Database");
        assert_eq!(owner.uid, "1234");
        assert_eq!(owner.controller, Some(true));

        let no_uid: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "example.com/v1",
            "kind": "Database",
            "metadata": {"name": "orders-db", "namespace": "apps"},
        }))
        .expect("valid source");
        assert!(matches!(
            owner_reference_for(&no_uid),
            Err(BindingError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_other_lookup_errors_are_surfaced() {
        let client = Arc::new(InMemoryClient::new());
        let name = SecretDescriptor::new("apps", "orders-db", payload(), None).name;
        client.fail_with(
            &secret_resource(),
            "apps",
            &name,
            ClientError::Transient("connection reset".to_string()),
        );
        let synthesizer = SecretSynthesizer::new(client.clone(), ComparisonMode::Exact);

        let err = synthesizer
            .synthesize("apps", "orders-db", &payload(), None)
            .await
            .expect_err("transient");
        assert!(matches!(err, BindingError::Transient(_)));
        assert_eq!(client.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let client = Arc::new(InMemoryClient::new());
        let synthesizer = SecretSynthesizer::new(client.clone(), ComparisonMode::Exact);
        let synthesized = synthesizer
            .synthesize("apps", "orders-db", &payload(), None)
            .await
            .expect("synthesize");
        let name = synthesized.descriptor.name;

        assert!(synthesizer.delete("apps", &name).await.expect("delete"));
        assert!(!synthesizer.delete("apps", &name).await.expect("second delete"));
        assert_eq!(client.count(&secret_resource(), "apps"), 0);
    }

    #[tokio::test]
    async fn test_is_same_on_missing_secret() {
        let synthesizer =
            SecretSynthesizer::new(Arc::new(InMemoryClient::new()), ComparisonMode::Exact);
        let result = synthesizer
            .is_same("apps", "fixed-name", &payload())
            .await
            .expect("compare");
        assert!(!result.success);
        assert_eq!(
            result.mismatch.map(|m| m.reason),
            Some(MismatchReason::Absent)
        );
    }

    #[tokio::test]
    async fn test_invalid_base_name_is_rejected_before_any_call() {
        let client = Arc::new(InMemoryClient::new());
        let synthesizer = SecretSynthesizer::new(client.clone(), ComparisonMode::Exact);

        for base in ["Orders_DB", "orders db", "-orders"] {
            let err = synthesizer
                .synthesize("apps", base, &payload(), None)
                .await
                .expect_err("invalid base name");
            assert!(
                matches!(&err, BindingError::Malformed { annotation, .. } if annotation == base),
                "{base}: {err}"
            );
        }
        assert_eq!(client.get_calls(), 0);
        assert_eq!(client.create_calls(), 0);

        let synthesized = synthesizer
            .synthesize("apps", "", &payload(), None)
            .await
            .expect("empty base uses the fingerprint alone");
        assert_eq!(synthesized.descriptor.name, synthesized.descriptor.fingerprint);
    }

    #[tokio::test]
    async fn test_is_same_treats_null_data_as_empty() {
        let client = Arc::new(InMemoryClient::new());
        client.insert(
            &secret_resource(),
            serde_json::from_value(json!({
                "apiVersion": "v1",
                "kind": "Secret",
                "metadata": {"name": "fixed-name", "namespace": "apps"},
                "data": null,
            }))
            .expect("valid secret"),
        );
        let synthesizer = SecretSynthesizer::new(client.clone(), ComparisonMode::Exact);

        let empty = synthesizer
            .is_same("apps", "fixed-name", &Payload::default())
            .await
            .expect("compare");
        assert!(empty.success);

        let populated = synthesizer
            .is_same("apps", "fixed-name", &payload())
            .await
            .expect("compare");
        assert!(!populated.success);
        assert_eq!(
            populated.mismatch.map(|m| m.reason),
            Some(MismatchReason::Missing)
        );
    }

    #[tokio::test]
    async fn test_owned_descriptors_compare_equal() {
        let synthesizer =
            SecretSynthesizer::new(Arc::new(InMemoryClient::new()), ComparisonMode::Exact);
        let owner = OwnerReference {
            api_version: "example.com/v1".to_string(),
            kind: "Database".to_string(),
            name: "orders-db".to_string(),
            uid: "1234".to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        };

        let first = synthesizer
            .synthesize("apps", "orders-db", &payload(), Some(owner.clone()))
            .await
            .expect("first");
        let second = synthesizer
            .synthesize("apps", "orders-db", &payload(), Some(owner))
            .await
            .expect("second");
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.descriptor, second.descriptor);
    }
}
