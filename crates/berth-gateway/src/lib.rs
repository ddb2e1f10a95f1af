//! Berth gateway: turns route tables into nginx configuration and keeps the
//! proxy daemon and its certificates in step with them.
//!
//! - [`compiler`] renders a route table into a site file
//! - [`edge`] publishes it and drives the daemon and certificate tool
//! - [`gateways`] records which cluster each local gateway belongs to

pub mod compiler;
pub mod edge;
pub mod error;
pub mod gateways;
pub mod runner;

pub use compiler::{CompiledConfig, compile, upstream_id};
pub use edge::{DaemonState, Edge, ReloadSummary};
pub use error::{GatewayError, GatewayResult};
pub use gateways::{GatewayEntry, GatewaysFile, register};
pub use runner::{CommandSpec, ExitOutcome, ProcessRunner, SystemRunner};
#[cfg(any(test, feature = "test-util"))]
pub use runner::ScriptedRunner;
