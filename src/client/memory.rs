//! # In-Memory Client
//!
//! A [`ResourceClient`] over a process-local store.
//!
//! Create has create-if-absent semantics like the API server, and failures can be
//! injected per object to exercise the not-found / forbidden / transient paths
//! without a cluster.

use super::ResourceClient;
use crate::error::ClientError;
use async_trait::async_trait;
use kube::core::{ApiResource, DynamicObject};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type ObjectKey = (String, String, String, String);

fn key(resource: &ApiResource, namespace: &str, name: &str) -> ObjectKey {
    (
        resource.api_version.clone(),
        resource.kind.clone(),
        namespace.to_string(),
        name.to_string(),
    )
}

#[derive(Debug, Default)]
pub struct InMemoryClient {
    objects: Mutex<HashMap<ObjectKey, DynamicObject>>,
    failures: Mutex<HashMap<ObjectKey, ClientError>>,
    creates: AtomicUsize,
    gets: AtomicUsize,
}

impl InMemoryClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, replacing any existing one with the same coordinates.
    /// The namespace is taken from the object's metadata.
    pub fn insert(&self, resource: &ApiResource, object: DynamicObject) {
        let namespace = object.metadata.namespace.clone().unwrap_or_default();
        let name = object.metadata.name.clone().unwrap_or_default();
        self.lock_objects()
            .insert(key(resource, &namespace, &name), object);
    }

    /// Make every call addressing these coordinates fail with `error`
    pub fn fail_with(&self, resource: &ApiResource, namespace: &str, name: &str, error: ClientError) {
        self.lock_failures()
            .insert(key(resource, namespace, name), error);
    }

    /// Look up a stored object without counting a call
    #[must_use]
    pub fn stored(&self, resource: &ApiResource, namespace: &str, name: &str) -> Option<DynamicObject> {
        self.lock_objects()
            .get(&key(resource, namespace, name))
            .cloned()
    }

    /// Number of stored objects of one kind in a namespace
    #[must_use]
    pub fn count(&self, resource: &ApiResource, namespace: &str) -> usize {
        self.lock_objects()
            .keys()
            .filter(|(api_version, kind, ns, _)| {
                *api_version == resource.api_version && *kind == resource.kind && ns == namespace
            })
            .count()
    }

    /// Number of successful creates
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::Relaxed)
    }

    /// Number of get calls, failed ones included
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::Relaxed)
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, HashMap<ObjectKey, DynamicObject>> {
        self.objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_failures(&self) -> std::sync::MutexGuard<'_, HashMap<ObjectKey, ClientError>> {
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn injected(&self, key: &ObjectKey) -> Option<ClientError> {
        self.lock_failures().get(key).cloned()
    }
}

#[async_trait]
impl ResourceClient for InMemoryClient {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<DynamicObject, ClientError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        let key = key(resource, namespace, name);
        if let Some(err) = self.injected(&key) {
            return Err(err);
        }
        self.lock_objects()
            .get(&key)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                kind: resource.kind.clone(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn create(
        &self,
        resource: &ApiResource,
        namespace: &str,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClientError> {
        let name = object.metadata.name.clone().unwrap_or_default();
        let key = key(resource, namespace, &name);
        if let Some(err) = self.injected(&key) {
            return Err(err);
        }

        let mut objects = self.lock_objects();
        if objects.contains_key(&key) {
            return Err(ClientError::AlreadyExists {
                kind: resource.kind.clone(),
                namespace: namespace.to_string(),
                name,
            });
        }

        let mut stored = object.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        stored.metadata.resource_version = Some("1".to_string());
        objects.insert(key, stored.clone());
        self.creates.fetch_add(1, Ordering::Relaxed);
        Ok(stored)
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClientError> {
        let key = key(resource, namespace, name);
        if let Some(err) = self.injected(&key) {
            return Err(err);
        }
        match self.lock_objects().remove(&key) {
            Some(_) => Ok(()),
            None => Err(ClientError::NotFound {
                kind: resource.kind.clone(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::secret_resource;

    fn secret(namespace: &str, name: &str) -> DynamicObject {
        DynamicObject::new(name, &secret_resource()).within(namespace)
    }

    #[tokio::test]
    async fn test_create_if_absent() {
        let client = InMemoryClient::new();
        let resource = secret_resource();

        client
            .create(&resource, "ns", &secret("ns", "a"))
            .await
            .expect("first create");
        let second = client.create(&resource, "ns", &secret("ns", "a")).await;

        assert!(matches!(second, Err(ClientError::AlreadyExists { .. })));
        assert_eq!(client.create_calls(), 1);
        assert_eq!(client.count(&resource, "ns"), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let client = InMemoryClient::new();
        let err = client
            .get(&secret_resource(), "ns", "missing")
            .await
            .expect_err("missing object");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let client = InMemoryClient::new();
        let resource = secret_resource();
        client.insert(&resource, secret("ns", "a"));
        client.fail_with(&resource, "ns", "a", ClientError::Forbidden("rbac".to_string()));

        let err = client.get(&resource, "ns", "a").await.expect_err("injected");
        assert_eq!(err, ClientError::Forbidden("rbac".to_string()));
    }
}
