//! Remote access to the cluster, one small trait per concern
//!
//! Production code uses `KubeCluster`, which wraps a `kube::Client` built once
//! in `main` and handed to every component. Tests use the in-memory
//! `MockCluster` from the `mock` module.

use crate::crd::route::Route;
use crate::crd::service::KnativeService;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Endpoints, Service};
use kube::api::{Api, PostParams};
use kube::runtime::{watcher, WatchStreamExt};
use kube::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} \"{name}\" already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("{kind} \"{name}\" was modified concurrently, update rejected")]
    Conflict { kind: &'static str, name: String },

    #[error("{kind} \"{name}\": {message} (HTTP {code})")]
    Rejected {
        kind: &'static str,
        name: String,
        code: u16,
        message: String,
    },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Watch failed: {0}")]
    Watch(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Classify a kube error for the object `namespace/name` of the given kind
    pub fn from_kube(err: kube::Error, kind: &'static str, namespace: &str, name: &str) -> Self {
        let name = format!("{}/{}", namespace, name);
        match err {
            kube::Error::Api(resp) if resp.code == 404 => ApiError::NotFound { kind, name },
            kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
                ApiError::AlreadyExists { kind, name }
            }
            kube::Error::Api(resp) if resp.code == 409 => ApiError::Conflict { kind, name },
            kube::Error::Api(resp) => ApiError::Rejected {
                kind,
                name,
                code: resp.code,
                message: resp.message,
            },
            other => ApiError::Kube(other),
        }
    }
}

/// Source of the legacy workload
#[async_trait]
pub trait WorkloadSource: Send + Sync {
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ApiError>;
}

/// Core Service and Endpoints access used to provision the proxy
#[async_trait]
pub trait ProxyStore: Send + Sync {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, ApiError>;

    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints, ApiError>;

    async fn create_service(&self, namespace: &str, service: &Service)
        -> Result<Service, ApiError>;

    async fn create_endpoints(
        &self,
        namespace: &str,
        endpoints: &Endpoints,
    ) -> Result<Endpoints, ApiError>;
}

/// Route access for the traffic shifter
#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn get_route(&self, namespace: &str, name: &str) -> Result<Route, ApiError>;

    /// Optimistic update: the route's resourceVersion must still be current,
    /// otherwise `ApiError::Conflict` is returned and nothing is written.
    async fn replace_route(&self, namespace: &str, route: &Route) -> Result<Route, ApiError>;
}

/// Knative Service access
#[async_trait]
pub trait ServiceStore: Send + Sync {
    async fn create_knative_service(
        &self,
        namespace: &str,
        service: &KnativeService,
    ) -> Result<KnativeService, ApiError>;

    /// Stream of every observed state of the named Knative Service
    ///
    /// Dropping the stream ends the underlying watch.
    fn watch_knative_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> BoxStream<'static, Result<KnativeService, ApiError>>;
}

/// `kube::Client` backed implementation of all cluster stores
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        KubeCluster { client }
    }

    /// Namespace of the current kubeconfig context
    pub fn default_namespace(&self) -> &str {
        self.client.default_namespace()
    }
}

#[async_trait]
impl WorkloadSource for KubeCluster {
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ApiError> {
        Api::<Deployment>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
            .map_err(|e| ApiError::from_kube(e, "Deployment", namespace, name))
    }
}

#[async_trait]
impl ProxyStore for KubeCluster {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, ApiError> {
        Api::<Service>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
            .map_err(|e| ApiError::from_kube(e, "Service", namespace, name))
    }

    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints, ApiError> {
        Api::<Endpoints>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
            .map_err(|e| ApiError::from_kube(e, "Endpoints", namespace, name))
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ApiError> {
        let name = service.metadata.name.clone().unwrap_or_default();
        Api::<Service>::namespaced(self.client.clone(), namespace)
            .create(&PostParams::default(), service)
            .await
            .map_err(|e| ApiError::from_kube(e, "Service", namespace, &name))
    }

    async fn create_endpoints(
        &self,
        namespace: &str,
        endpoints: &Endpoints,
    ) -> Result<Endpoints, ApiError> {
        let name = endpoints.metadata.name.clone().unwrap_or_default();
        Api::<Endpoints>::namespaced(self.client.clone(), namespace)
            .create(&PostParams::default(), endpoints)
            .await
            .map_err(|e| ApiError::from_kube(e, "Endpoints", namespace, &name))
    }
}

#[async_trait]
impl RouteStore for KubeCluster {
    async fn get_route(&self, namespace: &str, name: &str) -> Result<Route, ApiError> {
        Api::<Route>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
            .map_err(|e| ApiError::from_kube(e, "Route", namespace, name))
    }

    async fn replace_route(&self, namespace: &str, route: &Route) -> Result<Route, ApiError> {
        let name = route.metadata.name.clone().unwrap_or_default();
        // replace sends metadata.resourceVersion, so a stale read fails with 409
        Api::<Route>::namespaced(self.client.clone(), namespace)
            .replace(&name, &PostParams::default(), route)
            .await
            .map_err(|e| ApiError::from_kube(e, "Route", namespace, &name))
    }
}

#[async_trait]
impl ServiceStore for KubeCluster {
    async fn create_knative_service(
        &self,
        namespace: &str,
        service: &KnativeService,
    ) -> Result<KnativeService, ApiError> {
        let name = service.metadata.name.clone().unwrap_or_default();
        Api::<KnativeService>::namespaced(self.client.clone(), namespace)
            .create(&PostParams::default(), service)
            .await
            .map_err(|e| ApiError::from_kube(e, "Knative Service", namespace, &name))
    }

    fn watch_knative_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> BoxStream<'static, Result<KnativeService, ApiError>> {
        let api = Api::<KnativeService>::namespaced(self.client.clone(), namespace);
        let config = watcher::Config::default().fields(&format!("metadata.name={}", name));

        watcher(api, config)
            .applied_objects()
            .map_err(|e| ApiError::Watch(e.to_string()))
            .boxed()
    }
}

#[cfg(test)]
#[path = "cluster_test.rs"]
mod tests;
