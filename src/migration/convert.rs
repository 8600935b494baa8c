//! Deployment to Knative Service translation
//!
//! The pod template of a Deployment is round-tripped through JSON into the
//! revision pod schema, which keeps only the fields Knative supports. The
//! result is validated before it is wrapped into a Service.

use super::validation::{validate_pod_spec, ValidationErrors};
use crate::crd::service::{
    KnativeService, KnativeServiceSpec, RevisionPodSpec, RevisionSpec, RevisionTemplateSpec,
};
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::ObjectMeta;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Failed to parse deployment: {0}")]
    Decode(#[from] serde_yaml::Error),

    #[error("Failed to parse deployment: input is empty")]
    EmptyInput,

    #[error("Deployment has no pod template spec")]
    MissingPodSpec,

    #[error("Failed to serialize pod template: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("Failed to decode pod template into revision pod spec: {0}")]
    Deserialization(#[source] serde_json::Error),

    #[error("Deployment does not qualify as a revision: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Decode a Deployment from YAML or JSON text
///
/// Only the first document of a multi-document stream is read.
pub fn decode_deployment(input: &str) -> Result<Deployment, ConversionError> {
    let document = match serde_yaml::Deserializer::from_str(input).next() {
        Some(document) => document,
        None => return Err(ConversionError::EmptyInput),
    };
    let value: serde_yaml::Value = serde::Deserialize::deserialize(document)?;
    if value.is_null() {
        return Err(ConversionError::EmptyInput);
    }
    Ok(serde_yaml::from_value(value)?)
}

/// Translate a Deployment into a Knative Service
///
/// # Steps
/// 1. Clone the pod template spec and clear every container name
/// 2. Serialize it to JSON
/// 3. Decode the JSON as a `RevisionPodSpec` (unsupported fields are dropped)
/// 4. Validate, then wrap it with the Deployment's name and namespace
///
/// The Deployment itself is left untouched.
pub fn convert_to_service(deployment: &Deployment) -> Result<KnativeService, ConversionError> {
    let mut pod_spec = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.clone())
        .ok_or(ConversionError::MissingPodSpec)?;

    // Container names carry no meaning for a revision
    for container in pod_spec.containers.iter_mut() {
        container.name.clear();
    }

    let json = serde_json::to_value(&pod_spec).map_err(ConversionError::Serialization)?;
    let revision: RevisionPodSpec =
        serde_json::from_value(json).map_err(ConversionError::Deserialization)?;

    validate_pod_spec(&revision)?;

    debug!(
        deployment = ?deployment.metadata.name,
        containers = revision.containers.len(),
        "Deployment qualifies as a revision"
    );

    Ok(KnativeService {
        metadata: ObjectMeta {
            name: deployment.metadata.name.clone(),
            namespace: deployment.metadata.namespace.clone(),
            ..Default::default()
        },
        spec: KnativeServiceSpec {
            template: RevisionTemplateSpec {
                metadata: None,
                spec: RevisionSpec {
                    pod_spec: revision,
                    ..Default::default()
                },
            },
        },
        status: None,
    })
}

/// Render a Service as a single line of JSON
pub fn to_json_line(service: &KnativeService) -> Result<String, ConversionError> {
    serde_json::to_string(service).map_err(ConversionError::Serialization)
}

#[cfg(test)]
#[path = "convert_test.rs"]
mod tests;
