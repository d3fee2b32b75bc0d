//! Common fixtures for binding integration tests
//!
//! Builds source resources and referenced objects and loads them into an
//! `InMemoryClient`, so no test needs a live cluster.

#![allow(dead_code, reason = "Each test binary uses a different subset of fixtures")]

use base64::{engine::general_purpose, Engine as _};
use binding_secret_controller::client::memory::InMemoryClient;
use binding_secret_controller::client::{configmap_resource, secret_resource};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use serde_json::json;
use std::sync::Arc;

pub const NAMESPACE: &str = "apps";

/// A `Database` source resource with the given annotations and spec
pub fn database(annotations: serde_json::Value, spec: serde_json::Value) -> DynamicObject {
    serde_json::from_value(json!({
        "apiVersion": "example.com/v1",
        "kind": "Database",
        "metadata": {
            "name": "orders-db",
            "namespace": NAMESPACE,
            "uid": "5f0c7f6e-7a43-4b8e-9d55-1c1a3d2f9e10",
            "annotations": annotations,
        },
        "spec": spec,
    }))
    .expect("valid Database")
}

/// A Secret with base64-encoded data built from plain values
pub fn secret(name: &str, data: &[(&str, &str)]) -> DynamicObject {
    let data: serde_json::Map<String, serde_json::Value> = data
        .iter()
        .map(|(k, v)| ((*k).to_string(), json!(general_purpose::STANDARD.encode(v))))
        .collect();
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {"name": name, "namespace": NAMESPACE},
        "data": data,
    }))
    .expect("valid Secret")
}

pub fn configmap(name: &str, data: &[(&str, &str)]) -> DynamicObject {
    let data: serde_json::Map<String, serde_json::Value> = data
        .iter()
        .map(|(k, v)| ((*k).to_string(), json!(v)))
        .collect();
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": name, "namespace": NAMESPACE},
        "data": data,
    }))
    .expect("valid ConfigMap")
}

pub fn service_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "Service"))
}

pub fn service(name: &str, cluster_ip: &str) -> DynamicObject {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": name, "namespace": NAMESPACE},
        "spec": {"clusterIP": cluster_ip, "ports": [{"port": 5432}]},
    }))
    .expect("valid Service")
}

/// Client holding the `db-creds` Secret, the `db-config` ConfigMap and the `pg` Service
pub fn populated_client() -> Arc<InMemoryClient> {
    let client = Arc::new(InMemoryClient::new());
    client.insert(
        &secret_resource(),
        secret("db-creds", &[("username", "admin"), ("password", "hunter2")]),
    );
    client.insert(
        &configmap_resource(),
        configmap("db-config", &[("host", "pg.apps.svc"), ("sslmode", "require")]),
    );
    client.insert(&service_resource(), service("pg", "10.0.0.12"));
    client
}
