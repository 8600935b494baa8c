use super::cluster::{ApiError, ProxyStore, RouteStore, ServiceStore, WorkloadSource};
use super::console::Console;
use super::convert::{convert_to_service, ConversionError};
use super::proxy::{ensure_proxy, ProxyConfig, ProxyError, ProxyOutcome};
use super::readiness::{service_readiness, wait_for, ReadinessError};
use super::traffic::{shift_traffic, ShiftError, ShiftPlan};
use crate::crd::route::Route;
use crate::crd::service::KnativeService;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Default time to wait for the Knative Service to become ready
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to fetch deployment: {0}")]
    Deployment(#[source] ApiError),

    #[error("Failed to fetch route: {0}")]
    Route(#[source] ApiError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Failed to create Knative Service: {0}")]
    Create(#[source] ApiError),

    #[error("Knative Service did not become ready: {0}")]
    Readiness(#[from] ReadinessError),

    #[error("Traffic shift aborted: {0}")]
    Shift(#[from] ShiftError),
}

/// Everything the cluster has to offer for a migration
pub trait Cluster: WorkloadSource + ProxyStore + RouteStore + ServiceStore {}

impl<T: WorkloadSource + ProxyStore + RouteStore + ServiceStore> Cluster for T {}

/// What to migrate and how
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub namespace: String,
    pub deployment: String,
    pub route: String,
    pub plan: ShiftPlan,
    pub ready_timeout: Duration,
    pub proxy: ProxyConfig,
}

/// Result of a completed migration
#[derive(Debug)]
pub struct MigrationSummary {
    pub service: KnativeService,
    pub route: Route,
    pub proxy: ProxyOutcome,
}

/// Sequences a Deployment to Knative Service migration
///
/// Steps, each fatal on failure:
/// 1. Fetch the Deployment
/// 2. Fetch the Route
/// 3. Ensure the proxy Service/Endpoints exist
/// 4. Translate and validate the Deployment
/// 5. Create the Knative Service
/// 6. Wait for it to become ready
/// 7. Shift the Route's traffic to the proxy
///
/// Nothing is rolled back: resources created before a failure stay in place.
pub struct Migration<'a, C: Cluster, W: Write> {
    cluster: &'a C,
    options: MigrationOptions,
    console: Console<W>,
}

impl<'a, C: Cluster, W: Write> Migration<'a, C, W> {
    pub fn new(cluster: &'a C, options: MigrationOptions, console: Console<W>) -> Self {
        Migration {
            cluster,
            options,
            console,
        }
    }

    pub fn into_console(self) -> Console<W> {
        self.console
    }

    fn report<T, E>(&mut self, result: Result<T, E>) -> Result<T, MigrationError>
    where
        E: Into<MigrationError>,
    {
        match result {
            Ok(value) => {
                self.console.ok();
                Ok(value)
            }
            Err(e) => {
                self.console.failed();
                let e = e.into();
                error!(error = %e, "Migration step failed");
                Err(e)
            }
        }
    }

    pub async fn run(&mut self) -> Result<MigrationSummary, MigrationError> {
        let cluster = self.cluster;
        let ns = self.options.namespace.clone();
        let deployment_name = self.options.deployment.clone();
        let route_name = self.options.route.clone();

        info!(
            namespace = %ns,
            deployment = %deployment_name,
            route = %route_name,
            "Starting migration"
        );

        self.console
            .begin(&format!("Fetching deployment {}/{}", ns, deployment_name));
        let result = cluster
            .get_deployment(&ns, &deployment_name)
            .await
            .map_err(MigrationError::Deployment);
        let deployment = self.report(result)?;

        self.console
            .begin(&format!("Fetching route {}/{}", ns, route_name));
        let result = cluster
            .get_route(&ns, &route_name)
            .await
            .map_err(MigrationError::Route);
        self.report(result)?;

        self.console
            .begin(&format!("Ensuring proxy service {}", self.options.proxy.name));
        let proxy = match ensure_proxy(cluster, &self.options.proxy, &ns).await {
            Ok(ProxyOutcome::AlreadyExists) => {
                self.console.ok_with("(already exists)");
                ProxyOutcome::AlreadyExists
            }
            Ok(ProxyOutcome::EndpointsRestored) => {
                self.console.ok_with("(endpoints restored)");
                ProxyOutcome::EndpointsRestored
            }
            other => self.report(other)?,
        };

        self.console.begin("Converting deployment to Knative Service");
        let result = convert_to_service(&deployment);
        let mut service = self.report(result)?;
        // A Deployment read from the cluster always has a namespace
        service.metadata.namespace = Some(ns.clone());

        self.console
            .begin(&format!("Creating Knative Service {}/{}", ns, deployment_name));
        let result = cluster
            .create_knative_service(&ns, &service)
            .await
            .map_err(MigrationError::Create);
        self.report(result)?;

        self.console.begin("Waiting for Knative Service to become ready");
        let events = cluster.watch_knative_service(&ns, &deployment_name);
        let result = wait_for(events, self.options.ready_timeout, service_readiness).await;
        let service = self.report(result)?;

        let label = format!("Shifting traffic of route {}", route_name);
        let console = &mut self.console;
        console.progress(&label, 0);
        let result = shift_traffic(
            cluster,
            &ns,
            &route_name,
            &self.options.proxy.name,
            &self.options.plan,
            |weight| console.progress(&label, weight),
        )
        .await;
        console.end_progress(result.is_ok());
        let route = result?;

        let url = service
            .status
            .as_ref()
            .and_then(|s| s.url.clone())
            .unwrap_or_else(|| deployment_name.clone());
        self.console.success(&format!(
            "Route {} now sends all traffic to Knative Service {} ({})",
            route_name, deployment_name, url
        ));
        info!(namespace = %ns, deployment = %deployment_name, "Migration complete");

        Ok(MigrationSummary {
            service,
            route,
            proxy,
        })
    }
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod tests;
