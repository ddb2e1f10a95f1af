//! berth-core — types shared by the registry, the gateway and the daemon.

pub mod config;
pub mod credential;
pub mod name;
pub mod route;

pub use config::BerthConfig;
pub use credential::Credential;
pub use name::{InvalidName, SanitizedName, sanitize_name};
pub use route::{Route, RouteInstance};
