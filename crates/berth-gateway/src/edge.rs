//! Proxy/TLS lifecycle manager.
//!
//! Owns one gateway's route table and the nginx daemon behind it:
//!
//! ```text
//! Running --reload--> write site, seed include --> `reload` --> Running
//! Running --issue(host)--> `stop` --> Stopped --> certbot --> `start` --> Running
//! ```
//!
//! Reload and certificate issuance are serialized on one async mutex, so a
//! reload never lands while the daemon is down for issuance. Once a stop
//! has been attempted the daemon is always started again, whatever the stop
//! or the certificate tool returned; a failing tool is reported only after
//! the restart. The recorded state changes only when a command succeeds.

use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use berth_core::config::{CertificateTool, DaemonCommands, EdgeConfig, ProxyLayout};
use berth_core::{Route, sanitize_name};
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::compiler::{self, CompiledConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::runner::{CommandSpec, ExitOutcome, ProcessRunner};

/// Daemon state as last driven by this manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonVerb {
    Start,
    Stop,
    Reload,
}

impl DaemonVerb {
    fn as_str(self) -> &'static str {
        match self {
            DaemonVerb::Start => "start",
            DaemonVerb::Stop => "stop",
            DaemonVerb::Reload => "reload",
        }
    }
}

/// Result of a successful reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    pub routes: usize,
    pub upstreams: Vec<String>,
}

pub struct Edge {
    gateway: String,
    layout: ProxyLayout,
    daemon: DaemonCommands,
    certificate: CertificateTool,
    timeout: Option<Duration>,
    runner: Arc<dyn ProcessRunner>,
    routes: RwLock<Vec<Route>>,
    state: Mutex<DaemonState>,
    lifecycle: tokio::sync::Mutex<()>,
}

/// Write `contents` next to `target` and rename it into place.
async fn write_atomic(target: &Path, contents: &str) -> GatewayResult<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await.map_err(GatewayError::io(parent))?;
    }
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = target.with_file_name(format!(".{name}.tmp"));
    {
        let mut file = fs::File::create(&tmp).await.map_err(GatewayError::io(&tmp))?;
        file.write_all(contents.as_bytes()).await.map_err(GatewayError::io(&tmp))?;
        file.sync_all().await.map_err(GatewayError::io(&tmp))?;
    }
    fs::rename(&tmp, target).await.map_err(GatewayError::io(target))
}

/// Create the include file with `contents` unless it already exists.
///
/// Returns whether the file was written.
pub async fn seed_include(path: &Path, contents: &str) -> GatewayResult<bool> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(GatewayError::io(parent))?;
    }
    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await;
    match file {
        Ok(mut file) => {
            file.write_all(contents.as_bytes()).await.map_err(GatewayError::io(path))?;
            file.sync_all().await.map_err(GatewayError::io(path))?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(GatewayError::io(path)(e)),
    }
}

/// Hosts become certificate paths and tool arguments; only DNS-safe names pass.
fn validate_host(host: &str) -> GatewayResult<()> {
    match sanitize_name(host) {
        Ok(clean) if clean.as_str() == host => Ok(()),
        _ => Err(GatewayError::InvalidHost(host.to_string())),
    }
}

impl Edge {
    pub fn new(gateway: impl Into<String>, config: &EdgeConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            gateway: gateway.into(),
            layout: config.layout.clone(),
            daemon: config.daemon.clone(),
            certificate: config.certificate.clone(),
            timeout: config.tool_timeout_secs.map(Duration::from_secs),
            runner,
            routes: RwLock::new(Vec::new()),
            state: Mutex::new(DaemonState::Running),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    pub fn layout(&self) -> &ProxyLayout {
        &self.layout
    }

    /// The route table in effect.
    pub fn routes(&self) -> Vec<Route> {
        self.routes.read().expect("route table lock").clone()
    }

    pub fn daemon_state(&self) -> DaemonState {
        *self.state.lock().expect("daemon state lock")
    }

    fn set_state(&self, state: DaemonState) {
        *self.state.lock().expect("daemon state lock") = state;
    }

    /// Run a tool to completion, honouring the configured timeout.
    async fn run_tool(&self, tool: &str, command: &CommandSpec) -> GatewayResult<ExitOutcome> {
        debug!(%command, "running {tool}");
        let run = self.runner.run(command);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(GatewayError::ToolTimeout {
                        tool: tool.to_string(),
                        secs: limit.as_secs(),
                    });
                }
            },
            None => run.await,
        };
        result.map_err(|source| GatewayError::Spawn {
            tool: tool.to_string(),
            source,
        })
    }

    async fn drive_daemon(&self, verb: DaemonVerb) -> GatewayResult<()> {
        let argv = match verb {
            DaemonVerb::Start => &self.daemon.start,
            DaemonVerb::Stop => &self.daemon.stop,
            DaemonVerb::Reload => &self.daemon.reload,
        };
        let tool = format!("proxy {}", verb.as_str());
        let command = CommandSpec::from_argv(argv).ok_or_else(|| GatewayError::NotConfigured(tool.clone()))?;

        let outcome = self.run_tool(&tool, &command).await?;
        if !outcome.is_success() {
            return Err(GatewayError::ExternalToolFailure { tool, outcome });
        }
        match verb {
            DaemonVerb::Stop => self.set_state(DaemonState::Stopped),
            DaemonVerb::Start | DaemonVerb::Reload => self.set_state(DaemonState::Running),
        }
        info!(gateway = %self.gateway, verb = verb.as_str(), "proxy daemon");
        Ok(())
    }

    pub async fn start_daemon(&self) -> GatewayResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.drive_daemon(DaemonVerb::Start).await
    }

    pub async fn stop_daemon(&self) -> GatewayResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.drive_daemon(DaemonVerb::Stop).await
    }

    /// Replace the route table, republish the site file and reload nginx.
    ///
    /// The table is swapped as soon as the site file is on disk, so the
    /// in-memory table always matches the published configuration even if
    /// the daemon then refuses to reload.
    pub async fn reload(&self, routes: Vec<Route>) -> GatewayResult<ReloadSummary> {
        let _guard = self.lifecycle.lock().await;

        let CompiledConfig { site, include, upstreams } = compiler::compile(&self.gateway, &routes, &self.layout);
        let site_path = self.layout.site_path(&self.gateway);
        write_atomic(&site_path, &site).await?;
        if seed_include(&self.layout.include_path(&self.gateway), &include).await? {
            debug!(gateway = %self.gateway, "seeded custom include");
        }

        let count = routes.len();
        *self.routes.write().expect("route table lock") = routes;
        info!(gateway = %self.gateway, routes = count, path = %site_path.display(), "site configuration published");

        self.drive_daemon(DaemonVerb::Reload).await?;
        Ok(ReloadSummary {
            routes: count,
            upstreams,
        })
    }

    /// Take the proxy out of service, issue a certificate for `host`, and
    /// bring the proxy back.
    pub async fn issue_certificate(&self, host: &str, port: u16) -> GatewayResult<()> {
        validate_host(host)?;
        let _guard = self.lifecycle.lock().await;

        if let Err(e) = self.drive_daemon(DaemonVerb::Stop).await {
            // The daemon may be half down; bring it back before giving up.
            warn!(gateway = %self.gateway, %host, error = %e, "proxy stop failed, skipping issuance");
            if let Err(restart) = self.drive_daemon(DaemonVerb::Start).await {
                error!(%host, error = %restart, "proxy failed to restart after failed stop");
            }
            return Err(e);
        }
        info!(gateway = %self.gateway, %host, port, "proxy stopped for certificate issuance");

        let command = CommandSpec::new(self.certificate.program.clone(), self.certificate.args_for(host, port));
        let issued = match self.run_tool("certificate tool", &command).await {
            Ok(outcome) if outcome.is_success() => Ok(()),
            Ok(outcome) => Err(GatewayError::ExternalToolFailure {
                tool: "certificate tool".to_string(),
                outcome,
            }),
            Err(e) => Err(e),
        };

        let restarted = self.drive_daemon(DaemonVerb::Start).await;
        match (&issued, &restarted) {
            (Ok(()), Ok(())) => info!(%host, "certificate issued"),
            (Err(e), _) => warn!(%host, error = %e, "certificate issuance failed"),
            (_, Err(e)) => error!(%host, error = %e, "proxy failed to restart after issuance"),
        }
        issued.and(restarted)
    }
}
