//! Proxy endpoint provisioning
//!
//! The Route can only reference Services in its own namespace, while Knative
//! traffic enters through the ingress gateway in another namespace. The proxy
//! is a selector-less Service plus a hand-written Endpoints object pointing at
//! the gateway's cluster IP, so the Route gets an in-namespace backend.
//!
//! The proxy is created at most once per namespace and is left in place after
//! the migration so later migrations reuse it.

use super::cluster::{ApiError, ProxyStore};
use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

/// Default name of the proxy Service and Endpoints
pub const DEFAULT_PROXY_NAME: &str = "knatify-ingress-proxy";

/// Default namespace of the Knative ingress gateway (Kourier on OpenShift Serverless)
pub const DEFAULT_GATEWAY_NAMESPACE: &str = "knative-serving-ingress";

/// Default name of the Knative ingress gateway Service
pub const DEFAULT_GATEWAY_SERVICE: &str = "kourier";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Failed to look up proxy service: {0}")]
    Lookup(#[source] ApiError),

    #[error("Failed to read ingress gateway service: {0}")]
    Gateway(#[source] ApiError),

    #[error("Ingress gateway service {0} has no cluster IP")]
    NoClusterIp(String),

    #[error("Failed to create proxy: {0}")]
    Create(#[source] ApiError),
}

/// Outcome of `ensure_proxy`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyOutcome {
    Created,
    AlreadyExists,
    /// The Service existed but its Endpoints were missing and got recreated
    EndpointsRestored,
}

/// Where the proxy lives and what it forwards to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Name of the proxy Service/Endpoints in the migrated namespace
    pub name: String,
    pub gateway_namespace: String,
    pub gateway_service: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            name: DEFAULT_PROXY_NAME.to_string(),
            gateway_namespace: DEFAULT_GATEWAY_NAMESPACE.to_string(),
            gateway_service: DEFAULT_GATEWAY_SERVICE.to_string(),
        }
    }
}

impl ProxyConfig {
    /// Build the config from environment variables
    ///
    /// - KNATIFY_PROXY_NAME: proxy Service name (default: knatify-ingress-proxy)
    /// - KNATIFY_GATEWAY_NAMESPACE: gateway namespace (default: knative-serving-ingress)
    /// - KNATIFY_GATEWAY_SERVICE: gateway Service name (default: kourier)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        ProxyConfig {
            name: std::env::var("KNATIFY_PROXY_NAME").unwrap_or(defaults.name),
            gateway_namespace: std::env::var("KNATIFY_GATEWAY_NAMESPACE")
                .unwrap_or(defaults.gateway_namespace),
            gateway_service: std::env::var("KNATIFY_GATEWAY_SERVICE")
                .unwrap_or(defaults.gateway_service),
        }
    }
}

/// Ensure the proxy Service and Endpoints exist in `namespace`
///
/// This function is idempotent - it will:
/// - Return `AlreadyExists` if both the proxy Service and Endpoints are found
/// - Create whichever of the two is missing (404)
/// - Return Err on any other API error
///
/// A Service left without Endpoints by an interrupted run gets its Endpoints
/// back (`EndpointsRestored`); otherwise the Route would send traffic to a
/// backend with no addresses.
pub async fn ensure_proxy(
    store: &dyn ProxyStore,
    config: &ProxyConfig,
    namespace: &str,
) -> Result<ProxyOutcome, ProxyError> {
    let service_exists = match store.get_service(namespace, &config.name).await {
        Ok(_) => true,
        Err(e) if e.is_not_found() => false,
        Err(e) => return Err(ProxyError::Lookup(e)),
    };
    let endpoints_exist = match store.get_endpoints(namespace, &config.name).await {
        Ok(_) => true,
        Err(e) if e.is_not_found() => false,
        Err(e) => return Err(ProxyError::Lookup(e)),
    };

    if service_exists && endpoints_exist {
        info!(namespace, proxy = %config.name, "Proxy service already exists");
        return Ok(ProxyOutcome::AlreadyExists);
    }

    let gateway = store
        .get_service(&config.gateway_namespace, &config.gateway_service)
        .await
        .map_err(ProxyError::Gateway)?;

    let (service, endpoints) = build_proxy(config, namespace, &gateway)?;

    if !service_exists {
        store
            .create_service(namespace, &service)
            .await
            .map_err(ProxyError::Create)?;
    }
    if !endpoints_exist {
        store
            .create_endpoints(namespace, &endpoints)
            .await
            .map_err(ProxyError::Create)?;
    }

    let gateway_name = format!("{}/{}", config.gateway_namespace, config.gateway_service);
    if service_exists {
        warn!(
            namespace,
            proxy = %config.name,
            gateway = %gateway_name,
            "Proxy service had no endpoints, endpoints recreated"
        );
        return Ok(ProxyOutcome::EndpointsRestored);
    }

    info!(
        namespace,
        proxy = %config.name,
        gateway = %gateway_name,
        "Proxy service created"
    );
    Ok(ProxyOutcome::Created)
}

/// Build the proxy Service and Endpoints mirroring the gateway's ports
///
/// Node ports are dropped: they are cluster-wide and would collide with the
/// gateway's own.
pub fn build_proxy(
    config: &ProxyConfig,
    namespace: &str,
    gateway: &Service,
) -> Result<(Service, Endpoints), ProxyError> {
    let gateway_spec = gateway.spec.clone().unwrap_or_default();
    let cluster_ip = gateway_spec
        .cluster_ip
        .filter(|ip| !ip.is_empty() && ip != "None")
        .ok_or_else(|| {
            ProxyError::NoClusterIp(format!(
                "{}/{}",
                config.gateway_namespace, config.gateway_service
            ))
        })?;

    let ports: Vec<ServicePort> = gateway_spec
        .ports
        .unwrap_or_default()
        .into_iter()
        .map(|port| ServicePort {
            node_port: None,
            // Endpoints below expose the gateway's service ports directly
            target_port: Some(IntOrString::Int(port.port)),
            ..port
        })
        .collect();

    let endpoint_ports: Vec<EndpointPort> = ports
        .iter()
        .map(|port| EndpointPort {
            name: port.name.clone(),
            port: port.port,
            protocol: port.protocol.clone(),
            app_protocol: port.app_protocol.clone(),
        })
        .collect();

    let metadata = ObjectMeta {
        name: Some(config.name.clone()),
        namespace: Some(namespace.to_string()),
        labels: Some(BTreeMap::from([(
            "app.kubernetes.io/managed-by".to_string(),
            "knatify".to_string(),
        )])),
        ..Default::default()
    };

    let service = Service {
        metadata: metadata.clone(),
        spec: Some(ServiceSpec {
            ports: Some(ports),
            ..Default::default()
        }),
        status: None,
    };

    let endpoints = Endpoints {
        metadata,
        subsets: Some(vec![EndpointSubset {
            addresses: Some(vec![EndpointAddress {
                ip: cluster_ip,
                ..Default::default()
            }]),
            ports: Some(endpoint_ports),
            not_ready_addresses: None,
        }]),
    };

    Ok((service, endpoints))
}

#[cfg(test)]
#[path = "proxy_test.rs"]
mod tests;
