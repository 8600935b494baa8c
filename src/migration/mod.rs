//! Deployment to Knative Service migration
//!
//! - `convert` / `validation`: pure Deployment to Knative Service translation
//! - `proxy`: per-namespace proxy Service pointing at the ingress gateway
//! - `readiness`: watch-driven wait on status conditions
//! - `traffic`: stepwise Route weight shift
//! - `driver`: sequences all of the above against a `cluster` implementation

pub mod cluster;
pub mod console;
pub mod convert;
pub mod driver;
pub mod proxy;
pub mod readiness;
pub mod traffic;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use cluster::{ApiError, KubeCluster};
pub use convert::{convert_to_service, decode_deployment, to_json_line, ConversionError};
pub use driver::{Migration, MigrationError, MigrationOptions, MigrationSummary};
