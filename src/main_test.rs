#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use knatify::migration::ConversionError;

#[test]
fn test_read_deployment_from_yaml() {
    let input = b"apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: foo\n  namespace: ns\n";

    let deployment = read_deployment(&input[..]).unwrap();

    assert_eq!(deployment.metadata.name.as_deref(), Some("foo"));
    assert_eq!(deployment.metadata.namespace.as_deref(), Some("ns"));
}

#[test]
fn test_read_deployment_empty_input() {
    let err = read_deployment(&b""[..]).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ConversionError>(),
        Some(ConversionError::EmptyInput)
    ));
}

#[test]
fn test_render_error_keeps_the_whole_chain() {
    let err = anyhow::anyhow!("Deployment does not qualify as a revision")
        .context("Failed to convert deployment to service");

    let rendered = render_error(&err);

    assert!(rendered.contains("Error:"));
    assert!(rendered.contains(
        "Failed to convert deployment to service: Deployment does not qualify as a revision"
    ));
    assert!(!rendered.contains('\n'));
}

#[test]
fn test_render_error_skips_quoted_causes() {
    let err = anyhow::Error::new(ConversionError::EmptyInput).context("Failed to read input");
    let nested = anyhow::Error::new(std::io::Error::other("broken pipe"))
        .context("Failed to read deployment from stdin: broken pipe");

    assert_eq!(render_error(&err).matches("input is empty").count(), 1);
    assert_eq!(render_error(&nested).matches("broken pipe").count(), 1);
}
