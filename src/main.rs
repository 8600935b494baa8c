use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use k8s_openapi::api::apps::v1::Deployment;
use knatify::cli::{Cli, Command, ConvertArgs, MigrateArgs};
use knatify::migration::cluster::{KubeCluster, WorkloadSource};
use knatify::migration::console::Console;
use knatify::migration::proxy::ProxyConfig;
use knatify::migration::{convert_to_service, decode_deployment, to_json_line, Migration};
use kube::Client;
use std::io::Read;
use tracing::{error, info};

/// Log filter used when RUST_LOG is unset; stdout stays reserved for output
const DEFAULT_LOG_FILTER: &str = "warn";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Convert(args) => convert(args).await,
        Command::Migrate(args) => migrate(args).await,
    };

    if let Err(e) = result {
        eprintln!("{}", render_error(&e));
        std::process::exit(1);
    }
}

/// One red line with the error chain
///
/// Causes already quoted by the error above them are skipped.
fn render_error(err: &anyhow::Error) -> String {
    let mut message = err.to_string();
    for cause in err.chain().skip(1) {
        let cause = cause.to_string();
        if !message.contains(&cause) {
            message = format!("{}: {}", message, cause);
        }
    }
    format!("{} {}", "Error:".bold(), message).red().to_string()
}

async fn connect() -> anyhow::Result<KubeCluster> {
    let client = match Client::try_default().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            return Err(anyhow::Error::new(e).context("Failed to connect to the cluster"));
        }
    };
    info!(namespace = %client.default_namespace(), "Connected to Kubernetes cluster");
    Ok(KubeCluster::new(client))
}

/// Read and decode a Deployment from `reader` (YAML or JSON)
fn read_deployment(mut reader: impl Read) -> anyhow::Result<Deployment> {
    let mut input = String::new();
    reader
        .read_to_string(&mut input)
        .context("Failed to read deployment from stdin")?;
    Ok(decode_deployment(&input)?)
}

async fn convert(args: ConvertArgs) -> anyhow::Result<()> {
    let deployment = match args.deployment {
        Some(name) => {
            let cluster = connect().await?;
            let namespace = args
                .namespace
                .unwrap_or_else(|| cluster.default_namespace().to_string());
            cluster.get_deployment(&namespace, &name).await?
        }
        None => read_deployment(std::io::stdin().lock())?,
    };

    let service =
        convert_to_service(&deployment).context("Failed to convert deployment to service")?;
    println!("{}", to_json_line(&service)?);
    Ok(())
}

async fn migrate(args: MigrateArgs) -> anyhow::Result<()> {
    let cluster = connect().await?;
    let options = args.options(cluster.default_namespace(), ProxyConfig::from_env());

    let mut migration = Migration::new(&cluster, options, Console::stdout());
    migration.run().await?;
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
