//! Registry mode — installs registry state on disk and serves the
//! `/cluster` API over it.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use berth_registry::{FsStore, Registry};
use tracing::info;

/// Create registry state under `data_dir` and print the root credential.
pub async fn install(data_dir: &Path, name: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir).with_context(|| format!("create {}", data_dir.display()))?;
    let store = Arc::new(FsStore::new(data_dir));
    let root_key = Registry::install(store, name).await?;

    info!(path = %data_dir.display(), %name, "registry installed");
    println!("{}", root_key.expose());
    Ok(())
}

/// Serve the registry until Ctrl-C.
pub async fn serve(port: u16, data_dir: PathBuf) -> anyhow::Result<()> {
    let store = Arc::new(FsStore::new(&data_dir));
    let registry = Registry::open(store)
        .await
        .with_context(|| format!("open registry at {}", data_dir.display()))?;
    info!(name = registry.name(), path = %data_dir.display(), "registry opened");

    let router = berth_api::registry_router(Arc::new(registry));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "registry API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(crate::shutdown_signal())
        .await?;

    info!("registry stopped");
    Ok(())
}
