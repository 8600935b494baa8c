use crate::crd::service::{RevisionContainer, RevisionPodSpec};
use k8s_openapi::api::core::v1::Probe;
use std::collections::BTreeSet;
use std::fmt;

/// Ports the Knative queue-proxy and its metrics endpoints bind to
pub const RESERVED_PORTS: [i32; 5] = [8012, 8013, 8022, 9090, 9091];

/// Mount paths a revision container may not shadow
pub const RESERVED_PATHS: [&str; 6] = ["/", "/dev", "/dev/log", "/tmp", "/var", "/var/log"];

/// Port names understood by Knative for protocol selection
const ALLOWED_PORT_NAMES: [&str; 3] = ["", "http1", "h2c"];

/// A single violation: what is wrong, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub message: String,
    pub paths: Vec<String>,
}

impl FieldError {
    fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        FieldError {
            message: message.into(),
            paths: vec![path.into()],
        }
    }

    fn missing(path: impl Into<String>) -> Self {
        Self::new("missing field(s)", path)
    }

    fn invalid(value: impl fmt::Display, path: impl Into<String>) -> Self {
        Self::new(format!("invalid value: {}", value), path)
    }

    fn disallowed(path: impl Into<String>) -> Self {
        Self::new("must not set the field(s)", path)
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.paths.join(", "))
    }
}

/// Every violation found in a revision pod spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    /// Whether any violation mentions the given field path
    pub fn has_path(&self, path: &str) -> bool {
        self.errors
            .iter()
            .any(|e| e.paths.iter().any(|p| p == path))
    }
}

/// Validate a revision pod spec against Knative Serving's rules
///
/// Pure pass/fail: nothing is repaired. All violations are collected so the
/// operator sees every problem at once.
///
/// # Validation Rules
/// - At least one container; with several, exactly one declares a port
/// - Each container has an image and at most one (valid) port
/// - Env vars are named and set either `value` or `valueFrom`
/// - Probes use at most one handler (a liveness probe needs one)
/// - Volume mounts are absolute, not reserved, unique, and reference a volume
/// - Volumes have unique names, exactly one supported source, and are mounted
pub fn validate_pod_spec(spec: &RevisionPodSpec) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    let volume_names = validate_volumes(spec, &mut errors);

    if spec.containers.is_empty() {
        errors.push(FieldError::missing("containers"));
    } else if spec.containers.len() > 1 {
        let with_ports = spec
            .containers
            .iter()
            .filter(|c| c.ports.as_ref().is_some_and(|p| !p.is_empty()))
            .count();
        if with_ports != 1 {
            errors.push(FieldError::new(
                format!(
                    "exactly one container must declare a port when several containers are set, found {}",
                    with_ports
                ),
                "containers",
            ));
        }
    }

    let mut mounted = BTreeSet::new();
    for (i, container) in spec.containers.iter().enumerate() {
        validate_container(
            container,
            &format!("containers[{}]", i),
            &volume_names,
            &mut mounted,
            &mut errors,
        );
    }

    for (i, volume) in spec.volumes.iter().flatten().enumerate() {
        if !volume.name.is_empty() && !mounted.contains(volume.name.as_str()) {
            errors.push(FieldError::new(
                "volume must be mounted",
                format!("volumes[{}].name", i),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors { errors })
    }
}

fn validate_volumes<'a>(
    spec: &'a RevisionPodSpec,
    errors: &mut Vec<FieldError>,
) -> BTreeSet<&'a str> {
    let mut names = BTreeSet::new();

    for (i, volume) in spec.volumes.iter().flatten().enumerate() {
        let path = format!("volumes[{}]", i);

        if volume.name.is_empty() {
            errors.push(FieldError::missing(format!("{}.name", path)));
        } else if !names.insert(volume.name.as_str()) {
            errors.push(FieldError::new(
                format!("duplicate volume name {:?}", volume.name),
                format!("{}.name", path),
            ));
        }

        match volume.source_count() {
            1 => {}
            0 => errors.push(FieldError::new(
                "expected exactly one supported volume source (secret, configMap, projected, emptyDir), got neither",
                path,
            )),
            _ => errors.push(FieldError::new(
                "expected exactly one volume source, got several",
                path,
            )),
        }
    }

    names
}

fn validate_container<'a>(
    container: &'a RevisionContainer,
    path: &str,
    volume_names: &BTreeSet<&str>,
    mounted: &mut BTreeSet<&'a str>,
    errors: &mut Vec<FieldError>,
) {
    if container.image.as_deref().unwrap_or_default().is_empty() {
        errors.push(FieldError::missing(format!("{}.image", path)));
    }

    let ports = container.ports.as_deref().unwrap_or_default();
    if ports.len() > 1 {
        errors.push(FieldError::new(
            "more than one container port is set",
            format!("{}.ports", path),
        ));
    }
    for (i, port) in ports.iter().enumerate() {
        let port_path = format!("{}.ports[{}]", path, i);

        if !(0..=65535).contains(&port.container_port) {
            errors.push(FieldError::invalid(
                port.container_port,
                format!("{}.containerPort", port_path),
            ));
        } else if RESERVED_PORTS.contains(&port.container_port) {
            errors.push(FieldError::new(
                format!("port {} is reserved", port.container_port),
                format!("{}.containerPort", port_path),
            ));
        }

        let name = port.name.as_deref().unwrap_or_default();
        if !ALLOWED_PORT_NAMES.contains(&name) {
            errors.push(FieldError::invalid(name, format!("{}.name", port_path)));
        }

        if let Some(protocol) = port.protocol.as_deref() {
            if protocol != "TCP" {
                errors.push(FieldError::invalid(protocol, format!("{}.protocol", port_path)));
            }
        }

        if port.host_port.is_some() {
            errors.push(FieldError::disallowed(format!("{}.hostPort", port_path)));
        }
        if port.host_ip.is_some() {
            errors.push(FieldError::disallowed(format!("{}.hostIP", port_path)));
        }
    }

    for (i, env) in container.env.iter().flatten().enumerate() {
        let env_path = format!("{}.env[{}]", path, i);
        if env.name.is_empty() {
            errors.push(FieldError::missing(format!("{}.name", env_path)));
        }
        if env.value.is_some() && env.value_from.is_some() {
            errors.push(FieldError::new(
                "expected exactly one of value, valueFrom, got both",
                env_path,
            ));
        }
    }

    if let Some(probe) = &container.readiness_probe {
        if handler_count(probe) > 1 {
            errors.push(FieldError::new(
                "expected at most one probe handler, got several",
                format!("{}.readinessProbe", path),
            ));
        }
    }
    if let Some(probe) = &container.liveness_probe {
        let count = handler_count(probe);
        if count != 1 {
            errors.push(FieldError::new(
                format!("expected exactly one probe handler, got {}", count),
                format!("{}.livenessProbe", path),
            ));
        }
    }

    let mut mount_paths = BTreeSet::new();
    for (i, mount) in container.volume_mounts.iter().flatten().enumerate() {
        let mount_path = format!("{}.volumeMounts[{}]", path, i);

        if !mount.mount_path.starts_with('/') {
            errors.push(FieldError::new(
                "mount path must be absolute",
                format!("{}.mountPath", mount_path),
            ));
        } else if RESERVED_PATHS.contains(&mount.mount_path.trim_end_matches('/'))
            || mount.mount_path == "/"
        {
            errors.push(FieldError::new(
                format!("mount path {:?} is reserved", mount.mount_path),
                format!("{}.mountPath", mount_path),
            ));
        }

        if !mount_paths.insert(mount.mount_path.as_str()) {
            errors.push(FieldError::new(
                format!("duplicate mount path {:?}", mount.mount_path),
                format!("{}.mountPath", mount_path),
            ));
        }

        if volume_names.contains(mount.name.as_str()) {
            mounted.insert(mount.name.as_str());
        } else {
            errors.push(FieldError::new(
                format!("volume {:?} is not declared", mount.name),
                format!("{}.name", mount_path),
            ));
        }
    }
}

fn handler_count(probe: &Probe) -> usize {
    [
        probe.exec.is_some(),
        probe.http_get.is_some(),
        probe.tcp_socket.is_some(),
        probe.grpc.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count()
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;
