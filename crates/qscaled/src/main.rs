//! qscaled — the qscale daemon.
//!
//! Scales Kubernetes deployments by the depth of the RabbitMQ queues they
//! consume. Assembles:
//! - Configuration (TOML, validated up front)
//! - RabbitMQ management API client
//! - Kubernetes scale client
//! - One scheduling loop per target
//!
//! # Usage
//!
//! ```text
//! qscaled run --config /etc/qscale/qscale.toml --rabbitmq-url http://rabbitmq:15672
//! qscaled check --config /etc/qscale/qscale.toml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use qscale_autoscale::{Scheduler, TargetEvaluator};
use qscale_broker::RabbitMqClient;
use qscale_core::{ScalingTarget, load_targets};
use qscale_kube::DeploymentScaler;

#[derive(Parser)]
#[command(name = "qscaled", version, about = "Queue-depth autoscaler for Kubernetes deployments")]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the autoscaler until interrupted.
    Run {
        /// Path to the TOML configuration.
        #[arg(long, env = "QSCALE_CONFIG")]
        config: PathBuf,

        /// Namespace for targets that do not name one.
        #[arg(long, env = "NAMESPACE")]
        namespace: Option<String>,

        /// RabbitMQ management API base URL.
        #[arg(long, env = "RABBITMQ_MANAGEMENT_URL", default_value = "http://localhost:15672")]
        rabbitmq_url: String,

        #[arg(long, env = "RABBITMQ_USER", default_value = "guest")]
        rabbitmq_user: String,

        #[arg(long, env = "RABBITMQ_PASSWORD", default_value = "guest", hide_env_values = true)]
        rabbitmq_password: String,

        /// Broker request timeout in seconds.
        #[arg(long, default_value = "5")]
        broker_timeout: u64,
    },
    /// Validate the configuration and print the resolved targets.
    Check {
        #[arg(long, env = "QSCALE_CONFIG")]
        config: PathBuf,

        #[arg(long, env = "NAMESPACE")]
        namespace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run {
            config,
            namespace,
            rabbitmq_url,
            rabbitmq_user,
            rabbitmq_password,
            broker_timeout,
        } => {
            run(
                &config,
                namespace.as_deref(),
                &rabbitmq_url,
                &rabbitmq_user,
                &rabbitmq_password,
                Duration::from_secs(broker_timeout),
            )
            .await
        }
        Command::Check { config, namespace } => check(&config, namespace.as_deref()),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,qscaled=debug,qscale=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load(config: &Path, namespace: Option<&str>) -> anyhow::Result<Vec<ScalingTarget>> {
    load_targets(config, namespace)
        .with_context(|| format!("invalid configuration {}", config.display()))
}

async fn run(
    config: &Path,
    namespace: Option<&str>,
    rabbitmq_url: &str,
    rabbitmq_user: &str,
    rabbitmq_password: &str,
    broker_timeout: Duration,
) -> anyhow::Result<()> {
    info!("qscale daemon starting");

    let targets = load(config, namespace)?;
    info!(path = %config.display(), targets = targets.len(), "configuration loaded");

    // ── Clients ────────────────────────────────────────────────

    let broker = RabbitMqClient::new(rabbitmq_url, rabbitmq_user, rabbitmq_password, broker_timeout)
        .context("failed to create broker client")?;
    info!(url = rabbitmq_url, "broker client initialized");

    let orchestrator = DeploymentScaler::try_default()
        .await
        .context("failed to create kubernetes client")?;
    info!("kubernetes client initialized");

    // ── Scheduling ─────────────────────────────────────────────

    let evaluator = TargetEvaluator::new(Arc::new(orchestrator), Arc::new(broker));
    let scheduler = Scheduler::start(evaluator, targets);

    shutdown_signal().await?;
    info!("shutdown signal received");

    scheduler.shutdown().await;
    info!("qscale daemon stopped");
    Ok(())
}

fn check(config: &Path, namespace: Option<&str>) -> anyhow::Result<()> {
    let targets = load(config, namespace)?;
    for target in &targets {
        println!("{target}");
    }
    println!("{} target(s) OK", targets.len());
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("failed to install CTRL+C handler")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C handler")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_defaults() {
        let cli = Cli::try_parse_from(["qscaled", "run", "--config", "/etc/qscale.toml"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Text);
        match cli.command {
            Command::Run {
                config,
                rabbitmq_url,
                broker_timeout,
                ..
            } => {
                assert_eq!(config, PathBuf::from("/etc/qscale.toml"));
                assert_eq!(rabbitmq_url, "http://localhost:15672");
                assert_eq!(broker_timeout, 5);
            }
            Command::Check { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn parses_check_with_json_logs() {
        let cli = Cli::try_parse_from([
            "qscaled",
            "--log-format",
            "json",
            "check",
            "--config",
            "q.toml",
            "--namespace",
            "apps",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Command::Check { namespace, .. } => assert_eq!(namespace.as_deref(), Some("apps")),
            Command::Run { .. } => panic!("expected check"),
        }
    }

    #[test]
    fn rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["qscaled", "--log-format", "xml", "check", "--config", "q.toml"]).is_err());
    }
}
