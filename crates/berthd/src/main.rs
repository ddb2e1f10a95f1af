//! berthd — the Berth daemon.
//!
//! One binary for both halves of the control plane:
//! - Registry: identities, application versions and artifacts
//! - Gateway: route table push, nginx config, certificate issuance
//!
//! # Usage
//!
//! ```text
//! berthd registry install --name prod
//! berthd registry serve
//! berthd gateway register --name edge --cluster-host http://registry:7300 --root-key … --host edge.example.com
//! berthd gateway serve --name edge
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

mod gateway_mode;
mod registry_mode;

#[derive(Parser)]
#[command(name = "berthd", about = "Berth daemon", version)]
struct Cli {
    /// Path to berth.toml. Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the artifact registry.
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },
    /// Manage gateways on this host.
    Gateway {
        #[command(subcommand)]
        action: GatewayAction,
    },
    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand)]
enum RegistryAction {
    /// Create registry state and print the root credential.
    Install {
        /// Display name of the cluster.
        #[arg(long)]
        name: String,

        /// Data directory (overrides registry.data_dir).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Serve the registry HTTP API.
    Serve {
        /// Port to listen on (overrides registry.port).
        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum GatewayAction {
    /// Create a gateway identity in a cluster and record it locally.
    Register {
        #[arg(long)]
        name: String,

        /// Base URL of the registry, e.g. http://registry:7300.
        #[arg(long)]
        cluster_host: String,

        /// Registry root credential.
        #[arg(long)]
        root_key: String,

        /// Public host this gateway answers on.
        #[arg(long)]
        host: String,
    },
    /// Serve the gateway HTTP API for a registered gateway.
    Serve {
        #[arg(long)]
        name: String,

        /// Port to listen on (overrides edge.port).
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,berthd=debug,berth=debug".parse().unwrap());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = berth_core::BerthConfig::load(cli.config.as_deref())?;
    debug!(path = ?cli.config, "configuration loaded");

    match cli.command {
        Command::Registry { action } => match action {
            RegistryAction::Install { name, data_dir } => {
                let data_dir = data_dir.unwrap_or(config.registry.data_dir);
                registry_mode::install(&data_dir, &name).await
            }
            RegistryAction::Serve { port, data_dir } => {
                let data_dir = data_dir.unwrap_or(config.registry.data_dir);
                registry_mode::serve(port.unwrap_or(config.registry.port), data_dir).await
            }
        },
        Command::Gateway { action } => match action {
            GatewayAction::Register {
                name,
                cluster_host,
                root_key,
                host,
            } => gateway_mode::register(&config.edge, &name, &cluster_host, &root_key, &host).await,
            GatewayAction::Serve { name, port } => {
                let port = port.unwrap_or(config.edge.port);
                gateway_mode::serve(&config.edge, &name, port).await
            }
        },
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

/// Resolves when the process receives Ctrl-C.
pub(crate) async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C handler");
    tracing::info!("shutdown signal received");
}
