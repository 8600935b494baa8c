//! Command line interface

use crate::migration::driver::{MigrationOptions, DEFAULT_READY_TIMEOUT};
use crate::migration::proxy::ProxyConfig;
use crate::migration::traffic::{ShiftPlan, DEFAULT_ROLLOUT_DURATION, DEFAULT_STEP_INTERVAL};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "knatify",
    version,
    about = "Migrate a Deployment behind an OpenShift Route to a Knative Service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the Knative Service equivalent of a Deployment as one JSON line
    Convert(ConvertArgs),
    /// Create a Knative Service from a Deployment and shift a Route's traffic to it
    Migrate(MigrateArgs),
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Namespace of the Deployment (defaults to the kube context namespace)
    #[arg(short, long, requires = "deployment")]
    pub namespace: Option<String>,

    /// Fetch this Deployment from the cluster instead of reading stdin
    #[arg(short, long)]
    pub deployment: Option<String>,
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Route whose traffic is shifted
    #[arg(short, long)]
    pub route: String,

    /// Deployment to migrate; the Knative Service gets the same name
    #[arg(short, long)]
    pub deployment: String,

    /// Namespace of the Deployment and Route (defaults to the kube context namespace)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Total duration of the traffic shift [default: 30s]
    #[arg(long, value_parser = duration_arg)]
    pub duration: Option<Duration>,

    /// Pause between two traffic shift steps [default: 3s]
    #[arg(long, value_parser = duration_arg)]
    pub step_interval: Option<Duration>,

    /// Shift in ten 10% steps five seconds apart, ignoring --duration and --step-interval
    #[arg(long)]
    pub fixed_schedule: bool,

    /// How long to wait for the Knative Service to become ready [default: 5m]
    #[arg(long, value_parser = duration_arg)]
    pub ready_timeout: Option<Duration>,

    /// Name of the proxy Service [env: KNATIFY_PROXY_NAME]
    #[arg(long)]
    pub proxy_name: Option<String>,

    /// Namespace of the ingress gateway Service [env: KNATIFY_GATEWAY_NAMESPACE]
    #[arg(long)]
    pub gateway_namespace: Option<String>,

    /// Name of the ingress gateway Service [env: KNATIFY_GATEWAY_SERVICE]
    #[arg(long)]
    pub gateway_service: Option<String>,
}

impl MigrateArgs {
    pub fn plan(&self) -> ShiftPlan {
        if self.fixed_schedule {
            ShiftPlan::fixed()
        } else {
            ShiftPlan::timed(
                self.duration.unwrap_or(DEFAULT_ROLLOUT_DURATION),
                self.step_interval.unwrap_or(DEFAULT_STEP_INTERVAL),
            )
        }
    }

    /// Proxy settings: flags win over environment, environment over defaults
    pub fn proxy_config(&self, from_env: ProxyConfig) -> ProxyConfig {
        ProxyConfig {
            name: self.proxy_name.clone().unwrap_or(from_env.name),
            gateway_namespace: self
                .gateway_namespace
                .clone()
                .unwrap_or(from_env.gateway_namespace),
            gateway_service: self
                .gateway_service
                .clone()
                .unwrap_or(from_env.gateway_service),
        }
    }

    pub fn options(&self, default_namespace: &str, proxy: ProxyConfig) -> MigrationOptions {
        MigrationOptions {
            namespace: self
                .namespace
                .clone()
                .unwrap_or_else(|| default_namespace.to_string()),
            deployment: self.deployment.clone(),
            route: self.route.clone(),
            plan: self.plan(),
            ready_timeout: self.ready_timeout.unwrap_or(DEFAULT_READY_TIMEOUT),
            proxy: self.proxy_config(proxy),
        }
    }
}

/// Parse duration string (e.g., "30s", "5m", "1h") to std::time::Duration
///
/// # Limits
/// - Seconds (s): max 86400 (24 hours)
/// - Minutes (m): max 1440 (24 hours)
/// - Hours (h): max 168 (1 week)
/// - Zero is rejected
///
/// # Returns
/// * `Some(Duration)` - Successfully parsed duration within limits
/// * `None` - Invalid format, unsupported unit, zero, or exceeds limits
pub fn parse_duration(duration_str: &str) -> Option<Duration> {
    let duration_str = duration_str.trim();
    let unit = duration_str.chars().last()?;
    let number: u64 = duration_str[..duration_str.len() - unit.len_utf8()]
        .parse()
        .ok()?;

    if number == 0 {
        return None;
    }

    let (limit, seconds_per_unit) = match unit {
        's' => (86400, 1),
        'm' => (1440, 60),
        'h' => (168, 3600),
        _ => return None,
    };
    if number > limit {
        return None;
    }

    number.checked_mul(seconds_per_unit).map(Duration::from_secs)
}

/// clap value parser for duration flags
pub fn duration_arg(value: &str) -> Result<Duration, String> {
    parse_duration(value).ok_or_else(|| {
        format!(
            "invalid duration '{}': expected a positive number followed by s, m or h (e.g. 30s, 5m, 1h)",
            value
        )
    })
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
