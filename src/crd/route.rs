use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OpenShift Route: an HTTP routing rule with weighted backends
///
/// `to` is the primary backend and `alternateBackends` hold the rest. Every
/// field knatify does not touch (tls, port, wildcardPolicy...) is carried in
/// `extra` so a read-modify-write never drops it.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "route.openshift.io",
    version = "v1",
    kind = "Route",
    namespaced,
    schema = "disabled"
)]
pub struct RouteSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Primary backend
    pub to: RouteTargetReference,

    #[serde(
        rename = "alternateBackends",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub alternate_backends: Vec<RouteTargetReference>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A weighted reference to a backend of a Route
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RouteTargetReference {
    /// Backend kind, always "Service" for the routes knatify handles
    #[serde(default = "default_target_kind")]
    pub kind: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

impl Default for RouteTargetReference {
    fn default() -> Self {
        Self::service("", None)
    }
}

fn default_target_kind() -> String {
    "Service".to_string()
}

impl RouteTargetReference {
    pub fn service(name: &str, weight: Option<i32>) -> Self {
        RouteTargetReference {
            kind: default_target_kind(),
            name: name.to_string(),
            weight,
        }
    }

    /// Whether this reference points at the Service with the given name
    pub fn targets_service(&self, name: &str) -> bool {
        self.kind == "Service" && self.name == name
    }
}

impl RouteSpec {
    /// Sum of the primary weight and all alternate weights
    ///
    /// An unset primary weight counts as 100 and unset alternates as 0.
    pub fn total_weight(&self) -> i32 {
        self.to.weight.unwrap_or(100)
            + self
                .alternate_backends
                .iter()
                .map(|b| b.weight.unwrap_or(0))
                .sum::<i32>()
    }
}

#[cfg(test)]
#[path = "route_test.rs"]
mod tests;
