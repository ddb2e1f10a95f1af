//! berth.toml configuration parser.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working single-host setup backed by nginx and certbot.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BerthConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub edge: EdgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    pub data_dir: PathBuf,
    pub port: u16,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/berth/registry"),
            port: 7300,
        }
    }
}

/// Gateway-side settings: where the proxy config lives and which tools drive it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EdgeConfig {
    pub port: u16,
    /// Local multi-gateway state (`[[gateway]]` entries).
    pub gateways_file: PathBuf,
    /// Upper bound on any external tool run. Unset waits forever.
    pub tool_timeout_secs: Option<u64>,
    pub layout: ProxyLayout,
    pub daemon: DaemonCommands,
    pub certificate: CertificateTool,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            port: 7400,
            gateways_file: PathBuf::from("/etc/berth/gateways.toml"),
            tool_timeout_secs: None,
            layout: ProxyLayout::default(),
            daemon: DaemonCommands::default(),
            certificate: CertificateTool::default(),
        }
    }
}

/// Filesystem layout of the reverse proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProxyLayout {
    /// One generated site file per gateway name.
    pub sites_dir: PathBuf,
    /// One never-overwritten custom snippet per gateway name.
    pub include_dir: PathBuf,
    /// Certificates are read from `<cert_root>/<host>/{fullchain,privkey}.pem`.
    pub cert_root: PathBuf,
}

impl Default for ProxyLayout {
    fn default() -> Self {
        Self {
            sites_dir: PathBuf::from("/etc/nginx/sites-enabled"),
            include_dir: PathBuf::from("/etc/nginx/berth"),
            cert_root: PathBuf::from("/etc/letsencrypt/live"),
        }
    }
}

impl ProxyLayout {
    pub fn site_path(&self, gateway: &str) -> PathBuf {
        self.sites_dir.join(format!("{gateway}.conf"))
    }

    pub fn include_path(&self, gateway: &str) -> PathBuf {
        self.include_dir.join(format!("{gateway}.conf"))
    }

    pub fn cert_dir(&self, host: &str) -> PathBuf {
        self.cert_root.join(host)
    }
}

/// argv for each proxy daemon verb.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonCommands {
    pub start: Vec<String>,
    pub stop: Vec<String>,
    pub reload: Vec<String>,
}

impl Default for DaemonCommands {
    fn default() -> Self {
        let verb = |v: &str| vec!["service".to_string(), "nginx".to_string(), v.to_string()];
        Self {
            start: verb("start"),
            stop: verb("stop"),
            reload: verb("reload"),
        }
    }
}

/// Certificate issuance tool. `{host}` and `{port}` in `args` are substituted per call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CertificateTool {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for CertificateTool {
    fn default() -> Self {
        Self {
            program: "certbot".to_string(),
            args: [
                "certonly",
                "--standalone",
                "--non-interactive",
                "--agree-tos",
                "--register-unsafely-without-email",
                "-d",
                "{host}",
                "--http-01-port",
                "{port}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl CertificateTool {
    /// Render the argument list for one host.
    pub fn args_for(&self, host: &str, port: u16) -> Vec<String> {
        let port = port.to_string();
        self.args
            .iter()
            .map(|a| a.replace("{host}", host).replace("{port}", &port))
            .collect()
    }
}

impl BerthConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `path` when given, otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
