//! Gateway mode — registers a gateway with a cluster and serves its
//! `/gateway` API, driving the local nginx and certbot.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use berth_api::GatewayState;
use berth_core::config::EdgeConfig;
use berth_gateway::{Edge, GatewaysFile, SystemRunner};
use tracing::info;

/// Create a gateway identity in the cluster and append it to the gateways file.
pub async fn register(
    edge: &EdgeConfig,
    name: &str,
    cluster_host: &str,
    root_key: &str,
    host: &str,
) -> anyhow::Result<()> {
    let path = &edge.gateways_file;
    let mut gateways = GatewaysFile::load(path)?;
    // Fail before touching the cluster.
    if gateways.find(name).is_ok() {
        anyhow::bail!("gateway {name} already registered in {}", path.display());
    }

    let client = reqwest::Client::new();
    let entry = berth_gateway::register(&client, cluster_host, root_key, name, host).await?;
    let registered = entry.name.clone();
    gateways.append(entry)?;
    gateways.save(path)?;

    info!(gateway = %registered, path = %path.display(), "gateway recorded");
    Ok(())
}

/// Serve a registered gateway until Ctrl-C.
pub async fn serve(config: &EdgeConfig, name: &str, port: u16) -> anyhow::Result<()> {
    let gateways = GatewaysFile::load(&config.gateways_file)?;
    let entry = gateways
        .find(name)
        .with_context(|| format!("run `berthd gateway register --name {name}` first"))?;

    let edge = Edge::new(entry.name.clone(), config, Arc::new(SystemRunner));
    let state = GatewayState {
        edge: Arc::new(edge),
        cluster_key: entry.cluster_key.clone(),
    };
    info!(gateway = %entry.name, cluster = %entry.cluster_host, host = %entry.host, "gateway loaded");

    let router = berth_api::gateway_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gateway API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(crate::shutdown_signal())
        .await?;

    info!("gateway stopped");
    Ok(())
}
