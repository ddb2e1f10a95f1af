//! Declarative routes pushed to gateways.
//!
//! A gateway receives its complete route table on every reload; routes are
//! never persisted individually.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One public host/port mapping to an application environment's instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub host: String,
    /// Plain HTTP listen port.
    pub port: u16,
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub environment: String,
    /// TLS listen port. `None` means the route is served over plain HTTP.
    #[serde(default)]
    pub ssl: Option<u16>,
    #[serde(default)]
    pub instances: Vec<RouteInstance>,
    /// Websocket location paths.
    #[serde(default)]
    pub sockets: BTreeSet<String>,
}

/// A running instance backing a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInstance {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub worker: String,
    pub endpoint: String,
    pub port: u16,
}

impl RouteInstance {
    /// `host:port` as it appears in an upstream block.
    pub fn address(&self) -> String {
        format!("{}:{}", self.endpoint, self.port)
    }
}

impl Route {
    pub fn is_tls(&self) -> bool {
        self.ssl.is_some()
    }
}
