#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::crd::service::{RevisionContainer, RevisionPodSpec, RevisionVolume};
use k8s_openapi::api::core::v1::{
    ContainerPort, EnvVar, EnvVarSource, ExecAction, ObjectFieldSelector, Probe, TCPSocketAction,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

fn container(image: &str) -> RevisionContainer {
    RevisionContainer {
        image: Some(image.to_string()),
        ..Default::default()
    }
}

fn port(number: i32) -> ContainerPort {
    ContainerPort {
        container_port: number,
        ..Default::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

fn empty_dir_volume(name: &str) -> RevisionVolume {
    RevisionVolume {
        name: name.to_string(),
        empty_dir: Some(Default::default()),
        ..Default::default()
    }
}

fn spec_with(containers: Vec<RevisionContainer>) -> RevisionPodSpec {
    RevisionPodSpec {
        containers,
        ..Default::default()
    }
}

#[test]
fn test_minimal_spec_is_valid() {
    let spec = spec_with(vec![container("nginx:1.2")]);
    assert!(validate_pod_spec(&spec).is_ok());
}

#[test]
fn test_missing_containers_rejected() {
    let err = validate_pod_spec(&RevisionPodSpec::default()).unwrap_err();
    assert!(err.has_path("containers"));
    assert_eq!(err.to_string(), "missing field(s): containers");
}

#[test]
fn test_missing_image_rejected() {
    let spec = spec_with(vec![RevisionContainer::default()]);
    let err = validate_pod_spec(&spec).unwrap_err();
    assert!(err.has_path("containers[0].image"));
}

#[test]
fn test_single_port_accepted() {
    let mut c = container("app");
    c.ports = Some(vec![ContainerPort {
        container_port: 8080,
        name: Some("h2c".to_string()),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }]);
    assert!(validate_pod_spec(&spec_with(vec![c])).is_ok());
}

#[test]
fn test_more_than_one_port_rejected() {
    let mut c = container("app");
    c.ports = Some(vec![port(8080), port(8081)]);
    let err = validate_pod_spec(&spec_with(vec![c])).unwrap_err();
    assert!(err.has_path("containers[0].ports"));
}

#[test]
fn test_reserved_port_rejected() {
    for reserved in RESERVED_PORTS {
        let mut c = container("app");
        c.ports = Some(vec![port(reserved)]);
        let err = validate_pod_spec(&spec_with(vec![c])).unwrap_err();
        assert!(
            err.has_path("containers[0].ports[0].containerPort"),
            "port {} should be reserved",
            reserved
        );
    }
}

#[test]
fn test_port_name_protocol_and_host_port_rejected() {
    let mut c = container("app");
    c.ports = Some(vec![ContainerPort {
        container_port: 8080,
        name: Some("grpc".to_string()),
        protocol: Some("UDP".to_string()),
        host_port: Some(80),
        ..Default::default()
    }]);

    let err = validate_pod_spec(&spec_with(vec![c])).unwrap_err();

    assert!(err.has_path("containers[0].ports[0].name"));
    assert!(err.has_path("containers[0].ports[0].protocol"));
    assert!(err.has_path("containers[0].ports[0].hostPort"));
    assert_eq!(err.errors.len(), 3);
}

#[test]
fn test_multiple_containers_need_exactly_one_port() {
    let both_portless = spec_with(vec![container("app"), container("sidecar")]);
    let err = validate_pod_spec(&both_portless).unwrap_err();
    assert!(err.has_path("containers"));

    let mut serving = container("app");
    serving.ports = Some(vec![port(8080)]);
    let one_port = spec_with(vec![serving, container("sidecar")]);
    assert!(validate_pod_spec(&one_port).is_ok());
}

#[test]
fn test_env_var_with_value_and_value_from_rejected() {
    let mut c = container("app");
    c.env = Some(vec![
        EnvVar {
            name: "OK".to_string(),
            value: Some("1".to_string()),
            ..Default::default()
        },
        EnvVar {
            name: "POD".to_string(),
            value: Some("x".to_string()),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: "metadata.name".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        },
        EnvVar::default(),
    ]);

    let err = validate_pod_spec(&spec_with(vec![c])).unwrap_err();

    assert!(err.has_path("containers[0].env[1]"));
    assert!(err.has_path("containers[0].env[2].name"));
    assert!(!err.has_path("containers[0].env[0]"));
}

#[test]
fn test_probe_handlers() {
    let tcp = Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(8080),
            ..Default::default()
        }),
        ..Default::default()
    };
    let two_handlers = Probe {
        exec: Some(ExecAction {
            command: Some(vec!["true".to_string()]),
        }),
        ..tcp.clone()
    };

    let mut ok = container("app");
    ok.liveness_probe = Some(tcp);
    ok.readiness_probe = Some(Probe::default());
    assert!(validate_pod_spec(&spec_with(vec![ok])).is_ok());

    let mut bad = container("app");
    bad.readiness_probe = Some(two_handlers);
    bad.liveness_probe = Some(Probe::default());
    let err = validate_pod_spec(&spec_with(vec![bad])).unwrap_err();
    assert!(err.has_path("containers[0].readinessProbe"));
    assert!(err.has_path("containers[0].livenessProbe"));
}

#[test]
fn test_mounted_supported_volume_is_valid() {
    let mut c = container("app");
    c.volume_mounts = Some(vec![mount("cache", "/cache")]);
    let spec = RevisionPodSpec {
        containers: vec![c],
        volumes: Some(vec![empty_dir_volume("cache")]),
        ..Default::default()
    };

    assert!(validate_pod_spec(&spec).is_ok());
}

#[test]
fn test_volume_without_supported_source_rejected() {
    // What a hostPath volume looks like after decoding into the revision schema
    let mut c = container("app");
    c.volume_mounts = Some(vec![mount("host", "/data")]);
    let spec = RevisionPodSpec {
        containers: vec![c],
        volumes: Some(vec![RevisionVolume {
            name: "host".to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let err = validate_pod_spec(&spec).unwrap_err();

    assert!(err.has_path("volumes[0]"));
    assert_eq!(err.errors.len(), 1);
}

#[test]
fn test_unmounted_and_duplicate_volumes_rejected() {
    let spec = RevisionPodSpec {
        containers: vec![container("app")],
        volumes: Some(vec![empty_dir_volume("a"), empty_dir_volume("a")]),
        ..Default::default()
    };

    let err = validate_pod_spec(&spec).unwrap_err();

    assert!(err.has_path("volumes[1].name"));
    assert!(err
        .errors
        .iter()
        .any(|e| e.message == "volume must be mounted"));
}

#[test]
fn test_bad_mount_paths_rejected() {
    let mut c = container("app");
    c.volume_mounts = Some(vec![
        mount("a", "relative"),
        mount("a", "/var/log"),
        mount("a", "/data"),
        mount("a", "/data"),
        mount("missing", "/other"),
    ]);
    let spec = RevisionPodSpec {
        containers: vec![c],
        volumes: Some(vec![empty_dir_volume("a")]),
        ..Default::default()
    };

    let err = validate_pod_spec(&spec).unwrap_err();

    assert!(err.has_path("containers[0].volumeMounts[0].mountPath"));
    assert!(err.has_path("containers[0].volumeMounts[1].mountPath"));
    assert!(!err.has_path("containers[0].volumeMounts[2].mountPath"));
    assert!(err.has_path("containers[0].volumeMounts[3].mountPath"));
    assert!(err.has_path("containers[0].volumeMounts[4].name"));
}

#[test]
fn test_errors_display_joins_all_violations() {
    let spec = spec_with(vec![RevisionContainer::default(), RevisionContainer::default()]);
    let err = validate_pod_spec(&spec).unwrap_err();

    let text = err.to_string();
    assert!(text.contains("missing field(s): containers[0].image"));
    assert!(text.contains("missing field(s): containers[1].image"));
    assert_eq!(text.matches("; ").count(), err.errors.len() - 1);
}
