//! Local record of gateways registered with a cluster.
//!
//! Stored as TOML:
//!
//! ```toml
//! [[gateway]]
//! name = "edge"
//! cluster_host = "http://registry.internal:7300"
//! cluster_key = "…"
//! host = "edge.example.com"
//! ```

use std::path::Path;

use berth_core::Credential;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GatewayError, GatewayResult};

/// One registered gateway: its identity in the cluster and where it lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEntry {
    pub name: String,
    pub cluster_host: String,
    pub cluster_key: Credential,
    pub host: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewaysFile {
    #[serde(default, rename = "gateway")]
    pub gateways: Vec<GatewayEntry>,
}

impl GatewaysFile {
    /// Load the file; a missing file is an empty registry.
    pub fn load(path: &Path) -> GatewayResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(GatewayError::io(path)(e)),
        }
    }

    pub fn save(&self, path: &Path) -> GatewayResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(GatewayError::io(parent))?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(GatewayError::io(path))
    }

    pub fn find(&self, name: &str) -> GatewayResult<&GatewayEntry> {
        self.gateways
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| GatewayError::UnknownGateway(name.to_string()))
    }

    pub fn append(&mut self, entry: GatewayEntry) -> GatewayResult<()> {
        if self.gateways.iter().any(|g| g.name == entry.name) {
            return Err(GatewayError::AlreadyRegistered(entry.name));
        }
        self.gateways.push(entry);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CreateGatewayRequest<'a> {
    key: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedGateway {
    name: String,
    key: Credential,
}

/// Create a gateway identity in the cluster at `cluster_host`.
///
/// Returns the entry to append to the local gateways file. The name in the
/// entry is the cluster's sanitized form.
pub async fn register(
    client: &reqwest::Client,
    cluster_host: &str,
    root_key: &str,
    name: &str,
    host: &str,
) -> GatewayResult<GatewayEntry> {
    let base = cluster_host.trim_end_matches('/');
    let url = format!("{base}/cluster/create-gateway");

    let response = client
        .post(&url)
        .json(&CreateGatewayRequest { key: root_key, name })
        .send()
        .await
        .map_err(|e| GatewayError::Registration(format!("{url}: {e}")))?;
    let status = response.status();
    let envelope: Envelope<CreatedGateway> = response
        .json()
        .await
        .map_err(|e| GatewayError::Registration(format!("{url} returned {status}: {e}")))?;

    let created = match envelope {
        Envelope {
            success: true,
            data: Some(created),
            ..
        } => created,
        Envelope { error, .. } => {
            let reason = error.unwrap_or_else(|| status.to_string());
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(GatewayError::InvalidCredential);
            }
            return Err(GatewayError::Registration(reason));
        }
    };

    info!(gateway = %created.name, cluster = %base, "gateway registered");
    Ok(GatewayEntry {
        name: created.name,
        cluster_host: base.to_string(),
        cluster_key: created.key,
        host: host.to_string(),
    })
}
