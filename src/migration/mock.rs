//! In-memory cluster used by the migration tests

#![allow(clippy::unwrap_used)]

use super::cluster::{ApiError, ProxyStore, RouteStore, ServiceStore, WorkloadSource};
use crate::crd::route::Route;
use crate::crd::service::KnativeService;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Endpoints, Service};
use std::collections::BTreeMap;
use std::sync::Mutex;

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

#[derive(Default)]
pub struct MockCluster {
    deployments: Mutex<BTreeMap<Key, Deployment>>,
    services: Mutex<BTreeMap<Key, Service>>,
    endpoints: Mutex<BTreeMap<Key, Endpoints>>,
    routes: Mutex<BTreeMap<Key, Route>>,
    route_writes: Mutex<Vec<Route>>,
    knative_services: Mutex<BTreeMap<Key, KnativeService>>,
    watch_states: Mutex<Vec<KnativeService>>,
    /// Zero-based index of the route write that is rejected
    fail_route_write: Mutex<Option<usize>>,
    /// Zero-based index of the route write preceded by an edit from someone else
    concurrent_route_edit: Mutex<Option<usize>>,
    /// HTTP code returned by every service lookup instead of the stored data
    service_lookup_error: Mutex<Option<u16>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deployment(self, deployment: Deployment) -> Self {
        let k = key(
            deployment.metadata.namespace.as_deref().unwrap_or_default(),
            deployment.metadata.name.as_deref().unwrap_or_default(),
        );
        self.deployments.lock().unwrap().insert(k, deployment);
        self
    }

    pub fn with_service(self, service: Service) -> Self {
        let k = key(
            service.metadata.namespace.as_deref().unwrap_or_default(),
            service.metadata.name.as_deref().unwrap_or_default(),
        );
        self.services.lock().unwrap().insert(k, service);
        self
    }

    pub fn with_route(self, route: Route) -> Self {
        let k = key(
            route.metadata.namespace.as_deref().unwrap_or_default(),
            route.metadata.name.as_deref().unwrap_or_default(),
        );
        self.routes.lock().unwrap().insert(k, route);
        self
    }

    /// States emitted, in order, by every watch on a Knative Service
    pub fn with_watch_states(self, states: Vec<KnativeService>) -> Self {
        *self.watch_states.lock().unwrap() = states;
        self
    }

    pub fn fail_route_write_at(self, index: usize) -> Self {
        *self.fail_route_write.lock().unwrap() = Some(index);
        self
    }

    /// Bump the stored route's resourceVersion right before the given write,
    /// as another client updating the route would
    pub fn edit_route_concurrently_at(self, index: usize) -> Self {
        *self.concurrent_route_edit.lock().unwrap() = Some(index);
        self
    }

    pub fn fail_service_lookup(self, code: u16) -> Self {
        *self.service_lookup_error.lock().unwrap() = Some(code);
        self
    }

    pub fn services(&self) -> Vec<Service> {
        self.services.lock().unwrap().values().cloned().collect()
    }

    pub fn endpoints(&self) -> Vec<Endpoints> {
        self.endpoints.lock().unwrap().values().cloned().collect()
    }

    pub fn route(&self, namespace: &str, name: &str) -> Option<Route> {
        self.routes.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Every route successfully written, in order
    pub fn route_writes(&self) -> Vec<Route> {
        self.route_writes.lock().unwrap().clone()
    }

    pub fn knative_services(&self) -> Vec<KnativeService> {
        self.knative_services.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl WorkloadSource for MockCluster {
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ApiError> {
        self.deployments
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                kind: "Deployment",
                name: format!("{}/{}", namespace, name),
            })
    }
}

#[async_trait]
impl ProxyStore for MockCluster {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, ApiError> {
        if let Some(code) = *self.service_lookup_error.lock().unwrap() {
            return Err(ApiError::Rejected {
                kind: "Service",
                name: format!("{}/{}", namespace, name),
                code,
                message: "forbidden".to_string(),
            });
        }
        self.services
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                kind: "Service",
                name: format!("{}/{}", namespace, name),
            })
    }

    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints, ApiError> {
        self.endpoints
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                kind: "Endpoints",
                name: format!("{}/{}", namespace, name),
            })
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ApiError> {
        let name = service.metadata.name.clone().unwrap_or_default();
        let mut services = self.services.lock().unwrap();
        let k = key(namespace, &name);
        if services.contains_key(&k) {
            return Err(ApiError::AlreadyExists {
                kind: "Service",
                name,
            });
        }
        let mut stored = service.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        services.insert(k, stored.clone());
        Ok(stored)
    }

    async fn create_endpoints(
        &self,
        namespace: &str,
        endpoints: &Endpoints,
    ) -> Result<Endpoints, ApiError> {
        let name = endpoints.metadata.name.clone().unwrap_or_default();
        let mut all = self.endpoints.lock().unwrap();
        let k = key(namespace, &name);
        if all.contains_key(&k) {
            return Err(ApiError::AlreadyExists {
                kind: "Endpoints",
                name,
            });
        }
        let mut stored = endpoints.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        all.insert(k, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl RouteStore for MockCluster {
    async fn get_route(&self, namespace: &str, name: &str) -> Result<Route, ApiError> {
        self.routes
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                kind: "Route",
                name: format!("{}/{}", namespace, name),
            })
    }

    async fn replace_route(&self, namespace: &str, route: &Route) -> Result<Route, ApiError> {
        let name = route.metadata.name.clone().unwrap_or_default();
        let qualified = format!("{}/{}", namespace, name);

        let mut writes = self.route_writes.lock().unwrap();
        if *self.fail_route_write.lock().unwrap() == Some(writes.len()) {
            return Err(ApiError::Rejected {
                kind: "Route",
                name: qualified,
                code: 500,
                message: "etcd unavailable".to_string(),
            });
        }

        let mut routes = self.routes.lock().unwrap();
        let current = routes
            .get_mut(&key(namespace, &name))
            .ok_or_else(|| ApiError::NotFound {
                kind: "Route",
                name: qualified.clone(),
            })?;
        let mut concurrent_edit = self.concurrent_route_edit.lock().unwrap();
        if *concurrent_edit == Some(writes.len()) {
            *concurrent_edit = None;
            let bumped = current
                .metadata
                .resource_version
                .as_deref()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0)
                + 1000;
            current.metadata.resource_version = Some(bumped.to_string());
        }
        if current.metadata.resource_version != route.metadata.resource_version {
            return Err(ApiError::Conflict {
                kind: "Route",
                name: qualified,
            });
        }

        let version: u64 = current
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let mut stored = route.clone();
        stored.metadata.resource_version = Some((version + 1).to_string());
        *current = stored.clone();
        writes.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl ServiceStore for MockCluster {
    async fn create_knative_service(
        &self,
        namespace: &str,
        service: &KnativeService,
    ) -> Result<KnativeService, ApiError> {
        let name = service.metadata.name.clone().unwrap_or_default();
        let mut all = self.knative_services.lock().unwrap();
        let k = key(namespace, &name);
        if all.contains_key(&k) {
            return Err(ApiError::AlreadyExists {
                kind: "Knative Service",
                name: format!("{}/{}", namespace, name),
            });
        }
        let mut stored = service.clone();
        stored.metadata.generation = Some(1);
        all.insert(k, stored.clone());
        Ok(stored)
    }

    fn watch_knative_service(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> BoxStream<'static, Result<KnativeService, ApiError>> {
        let states = self.watch_states.lock().unwrap().clone();
        // A real watch never ends on its own
        stream::iter(states.into_iter().map(Ok))
            .chain(stream::pending())
            .boxed()
    }
}
