use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, ContainerPort, EmptyDirVolumeSource, EnvFromSource, EnvVar,
    LocalObjectReference, Probe, ProjectedVolumeSource, ResourceRequirements,
    SecretVolumeSource, SecurityContext, VolumeMount,
};
use kube::api::ObjectMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Condition type that summarizes overall readiness of a Knative resource
pub const READY_CONDITION: &str = "Ready";

/// Knative Service: an autoscaled workload wrapping a single revision template
///
/// Only the parts knatify writes or reads back are modelled. The CRD itself is
/// owned by Knative Serving, so no schema is generated for it.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "serving.knative.dev",
    version = "v1",
    kind = "Service",
    root = "KnativeService",
    namespaced,
    status = "KnativeServiceStatus",
    schema = "disabled"
)]
pub struct KnativeServiceSpec {
    /// Template for the revisions this Service stamps out
    pub template: RevisionTemplateSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RevisionTemplateSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,

    pub spec: RevisionSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RevisionSpec {
    /// The pod shape of every revision, inlined like Knative does
    #[serde(flatten)]
    pub pod_spec: RevisionPodSpec,

    /// Maximum concurrent requests per replica (0 = unlimited)
    #[serde(
        rename = "containerConcurrency",
        skip_serializing_if = "Option::is_none"
    )]
    pub container_concurrency: Option<i64>,

    /// Request timeout in seconds
    #[serde(rename = "timeoutSeconds", skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,
}

/// The subset of a Kubernetes PodSpec accepted by a Knative revision
///
/// Decoding a full PodSpec into this type drops every field Knative does not
/// support (node selectors, host networking, init containers...).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RevisionPodSpec {
    #[serde(default)]
    pub containers: Vec<RevisionContainer>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<RevisionVolume>>,

    #[serde(rename = "serviceAccountName", skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(rename = "imagePullSecrets", skip_serializing_if = "Option::is_none")]
    pub image_pull_secrets: Option<Vec<LocalObjectReference>>,

    #[serde(rename = "enableServiceLinks", skip_serializing_if = "Option::is_none")]
    pub enable_service_links: Option<bool>,

    #[serde(
        rename = "automountServiceAccountToken",
        skip_serializing_if = "Option::is_none"
    )]
    pub automount_service_account_token: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RevisionContainer {
    /// Always serialized, even when empty
    #[serde(default)]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    #[serde(rename = "workingDir", skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<ContainerPort>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVar>>,

    #[serde(rename = "envFrom", skip_serializing_if = "Option::is_none")]
    pub env_from: Option<Vec<EnvFromSource>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(rename = "volumeMounts", skip_serializing_if = "Option::is_none")]
    pub volume_mounts: Option<Vec<VolumeMount>>,

    #[serde(rename = "livenessProbe", skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<Probe>,

    #[serde(rename = "readinessProbe", skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<Probe>,

    #[serde(rename = "securityContext", skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,

    #[serde(rename = "imagePullPolicy", skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    #[serde(
        rename = "terminationMessagePath",
        skip_serializing_if = "Option::is_none"
    )]
    pub termination_message_path: Option<String>,

    #[serde(
        rename = "terminationMessagePolicy",
        skip_serializing_if = "Option::is_none"
    )]
    pub termination_message_policy: Option<String>,
}

/// A revision volume. Knative only supports these four sources; any other
/// source in the input is dropped during decoding and caught by validation.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RevisionVolume {
    #[serde(default)]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretVolumeSource>,

    #[serde(rename = "configMap", skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapVolumeSource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub projected: Option<ProjectedVolumeSource>,

    #[serde(rename = "emptyDir", skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDirVolumeSource>,
}

impl RevisionVolume {
    /// Number of volume sources set on this volume
    pub fn source_count(&self) -> usize {
        [
            self.secret.is_some(),
            self.config_map.is_some(),
            self.projected.is_some(),
            self.empty_dir.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// Status reported by Knative Serving for a Service
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct KnativeServiceStatus {
    /// Generation of the spec the conditions below refer to
    #[serde(rename = "observedGeneration", skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Public URL of the Service once routable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(
        rename = "latestReadyRevisionName",
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_ready_revision_name: Option<String>,

    #[serde(
        rename = "latestCreatedRevisionName",
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_created_revision_name: Option<String>,
}

/// A Knative status condition
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,

    /// "True", "False" or "Unknown"
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(
        rename = "lastTransitionTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }

    pub fn is_false(&self) -> bool {
        self.status == "False"
    }
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
