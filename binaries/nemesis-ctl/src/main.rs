//! Nemesis Ctl - Run one fault against a cluster from the command line.
//!
//! Loads a nemesis configuration, starts the fault, holds it for a while
//! (or until interrupted), then stops it and cleans up. Every completed
//! operation is printed to stdout as one JSON line.
//!
//! # Usage
//!
//! ```bash
//! # Partition five nodes for a minute
//! nemesis-ctl --config partition.toml --nodes n1,n2,n3,n4,n5 --hold-secs 60
//!
//! # See what would run without touching the nodes
//! nemesis-ctl --config pause.toml --nodes n1,n2,n3 --dry-run
//!
//! # Print the default configuration
//! nemesis-ctl --print-config
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use nemesis_core::{LoggingConfig, Nemesis, NemesisConfig, NodeId, Operation, TestContext};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// CLI arguments for nemesis-ctl.
#[derive(Parser, Debug)]
#[command(
    name = "nemesis-ctl",
    about = "Inject a partition, clock skew or process fault into a cluster",
    version
)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Nodes of the cluster under test.
    #[arg(short, long, value_name = "NODES", value_delimiter = ',')]
    nodes: Vec<String>,

    /// Seconds to hold the fault before stopping it.
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    hold_secs: u64,

    /// Log commands instead of running them.
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Enable JSON log output.
    #[arg(long)]
    json_logs: bool,

    /// Print the default configuration and exit.
    #[arg(long)]
    print_config: bool,
}

impl CliArgs {
    /// Merges CLI overrides into the configuration.
    fn merge_into(&self, config: &mut NemesisConfig) {
        if self.dry_run {
            config.dry_run = true;
        }
        if let Some(ref level) = self.log_level {
            config.logging.level = level.clone();
        }
    }

    fn cluster(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(NodeId::from)
            .collect()
    }
}

/// Initializes the tracing subscriber.
fn init_tracing(config: &LoggingConfig, json_logs: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Failed to parse log filter")?;

    let format = if json_logs || config.format == "json" {
        "json"
    } else {
        &config.format
    };

    // Logs go to stderr; stdout carries the operations.
    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
        "compact" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_op(op: &Operation) -> Result<()> {
    println!("{}", serde_json::to_string(op).context("Failed to encode operation")?);
    Ok(())
}

async fn run(config: &NemesisConfig, nodes: Vec<NodeId>, hold: Duration) -> Result<()> {
    let nemesis = config.build_nemesis().context("Failed to build nemesis")?;
    let ctx = config
        .build_context(nodes)
        .context("Failed to build test context")?;

    info!(
        run_id = %ctx.run_id,
        nemesis = nemesis.name(),
        nodes = ctx.nodes.len(),
        dry_run = config.dry_run,
        "Nemesis starting"
    );

    cycle(nemesis.as_ref(), &ctx, hold).await
}

/// Runs setup, start, hold, stop and teardown against `ctx`.
///
/// Stop and teardown always run once setup succeeded, so a start that
/// failed on some nodes is still reversed on the others.
async fn cycle(nemesis: &dyn Nemesis, ctx: &TestContext, hold: Duration) -> Result<()> {
    nemesis.setup(ctx).await.context("Nemesis setup failed")?;

    let started = nemesis.invoke(ctx, Operation::start()).await;
    match &started {
        Ok(op) => {
            if let Err(e) = print_op(op) {
                warn!(error = %e, "Failed to print start operation");
            }
            tokio::select! {
                () = tokio::time::sleep(hold) => {
                    info!(hold_secs = hold.as_secs(), "Hold time elapsed");
                }
                () = shutdown_signal() => info!("Shutdown signal received"),
            }
        }
        Err(e) => error!(error = %e, "Failed to start fault; reversing it"),
    }

    let stopped = nemesis.invoke(ctx, Operation::stop()).await;
    let torn_down = nemesis.teardown(ctx).await;

    if let Err(e) = started {
        match &stopped {
            Ok(op) => print_op(op)?,
            Err(stop_err) => warn!(error = %stop_err, "Failed to stop fault"),
        }
        if let Err(teardown_err) = &torn_down {
            warn!(error = %teardown_err, "Nemesis teardown failed");
        }
        return Err(e).context("Failed to start fault");
    }

    print_op(&stopped.context("Failed to stop fault")?)?;
    torn_down.context("Nemesis teardown failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    if args.print_config {
        let config = NemesisConfig::default();
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut config = if let Some(ref config_path) = args.config {
        NemesisConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        NemesisConfig::default()
    };

    args.merge_into(&mut config);
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.logging, args.json_logs)?;

    let nodes = args.cluster();
    if nodes.is_empty() {
        anyhow::bail!("No nodes given; pass --nodes a,b,c");
    }

    if let Err(e) = run(&config, nodes, Duration::from_secs(args.hold_secs)).await {
        error!(error = %e, "Nemesis failed");
        return Err(e);
    }

    info!("Nemesis stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nemesis_core::faults::process::{hammer_time, FixedTargets};
    use nemesis_core::DryRunExecutor;
    use std::sync::Arc;

    #[test]
    fn test_cli_args_parsing() {
        let args = CliArgs::parse_from(["nemesis-ctl"]);
        assert!(args.config.is_none());
        assert!(args.nodes.is_empty());
        assert_eq!(args.hold_secs, 30);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_nodes_split_on_commas() {
        let args = CliArgs::parse_from(["nemesis-ctl", "--nodes", "n1,n2, n3,"]);
        assert_eq!(args.cluster(), nemesis_core::nodes(["n1", "n2", "n3"]));
    }

    #[test]
    fn test_merge_overrides() {
        let args = CliArgs::parse_from(["nemesis-ctl", "--dry-run", "--log-level", "debug"]);
        let mut config = NemesisConfig::default();
        args.merge_into(&mut config);

        assert!(config.dry_run);
        assert_eq!(config.logging.level, "debug");
    }

    #[tokio::test]
    async fn test_dry_run_cycle() {
        let config = NemesisConfig::from_toml_str(
            r#"
            dry_run = true
            seed = 1

            [fault]
            kind = "partition"
            scheme = "halves"
            "#,
        )
        .unwrap();

        run(
            &config,
            nemesis_core::nodes(["n1", "n2", "n3"]),
            Duration::from_millis(10),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_failed_start_is_reversed() {
        let exec = Arc::new(DryRunExecutor::new().fail_on("n1"));
        let ctx = TestContext::builder()
            .nodes(nemesis_core::nodes(["n1", "n2", "n3"]))
            .remote(exec.clone())
            .build()
            .unwrap();
        let nemesis = hammer_time(FixedTargets(nemesis_core::nodes(["n1", "n3"])), "etcd");

        // The hold is skipped once the start fails.
        let err = cycle(&nemesis, &ctx, Duration::from_secs(3600))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to start fault");

        let n3 = exec.commands_for(&"n3".into());
        assert_eq!(n3.len(), 2);
        assert!(n3[0].contains("pkill -STOP -x"));
        assert!(n3[1].contains("pkill -CONT -x"));
        assert_eq!(exec.commands_for(&"n1".into()).len(), 2);
        assert!(exec.commands_for(&"n2".into()).is_empty());
    }
}
