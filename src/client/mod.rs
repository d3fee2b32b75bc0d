//! # Resource Client
//!
//! Generic get/create/delete access to namespaced cluster objects.
//!
//! Every component receives a [`ResourceClient`] explicitly so that tests can swap in
//! [`memory::InMemoryClient`] and passes never share client state.

use crate::error::ClientError;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use tracing::debug;

pub mod memory;

/// Minimal dynamic client over namespaced objects
///
/// Implementations must report a missing object as [`ClientError::NotFound`] and a
/// create of an existing name as [`ClientError::AlreadyExists`].
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch one object
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, ClientError>;

    /// Create an object; fails with `AlreadyExists` when the name is taken
    async fn create(
        &self,
        resource: &ApiResource,
        namespace: &str,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClientError>;

    /// Delete one object
    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClientError>;
}

/// `ApiResource` for core/v1 Secrets
#[must_use]
pub fn secret_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "Secret"))
}

/// `ApiResource` for core/v1 ConfigMaps
#[must_use]
pub fn configmap_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "ConfigMap"))
}

/// [`ResourceClient`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
}

impl std::fmt::Debug for KubeResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeResourceClient").finish_non_exhaustive()
    }
}

impl KubeResourceClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, resource: &ApiResource, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, resource)
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, ClientError> {
        debug!(kind = %resource.kind, namespace, name, "GET");
        self.api(resource, namespace)
            .get(name)
            .await
            .map_err(|e| ClientError::from_kube(e, &resource.kind, namespace, name))
    }

    async fn create(
        &self,
        resource: &ApiResource,
        namespace: &str,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClientError> {
        let name = object.metadata.name.as_deref().unwrap_or_default();
        debug!(kind = %resource.kind, namespace, name, "CREATE");
        self.api(resource, namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| ClientError::from_kube(e, &resource.kind, namespace, name))
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClientError> {
        debug!(kind = %resource.kind, namespace, name, "DELETE");
        self.api(resource, namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| ClientError::from_kube(e, &resource.kind, namespace, name))
    }
}
