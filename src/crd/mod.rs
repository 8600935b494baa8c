//! Resource types knatify reads and writes that are not part of k8s-openapi
//!
//! - `service`: Knative Serving `Service` (the migration target)
//! - `route`: OpenShift `Route` (the traffic split being shifted)

pub mod route;
pub mod service;
