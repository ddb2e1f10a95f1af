//! berth-api — HTTP surfaces for the registry and the gateway.
//!
//! # Registry routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/cluster/create-worker` | Register a worker (root key) |
//! | POST | `/cluster/create-client` | Register a client (root key) |
//! | POST | `/cluster/create-gateway` | Register a gateway (root key) |
//! | POST | `/cluster/create-image` | Reserve an application version (client key) |
//! | POST | `/cluster/upload-image` | Stream an artifact (upload key) |
//! | POST | `/cluster/ping` | Worker heartbeat |
//! | GET | `/cluster/applications/{application}/versions` | List versions (worker key) |
//! | GET | `/cluster/download-image/{application}/{version}` | Pull an artifact (worker key) |
//!
//! # Gateway routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/gateway/reload` | Replace the route table and reload the proxy |
//! | POST | `/gateway/ssl` | Issue a certificate for a host |
//! | GET | `/gateway/routes` | Current route table |

pub mod gateway;
pub mod registry;
pub mod response;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use berth_registry::Registry;

pub use gateway::GatewayState;
pub use registry::RegistryState;
pub use response::{ApiError, ApiResponse};

/// Build the registry router.
pub fn registry_router(registry: Arc<Registry>) -> Router {
    let state = RegistryState { registry };

    let cluster = Router::new()
        .route("/create-worker", post(registry::create_worker))
        .route("/create-client", post(registry::create_client))
        .route("/create-gateway", post(registry::create_gateway))
        .route("/create-image", post(registry::create_image))
        .route(
            "/upload-image",
            post(registry::upload_image).layer(DefaultBodyLimit::disable()),
        )
        .route("/ping", post(registry::ping))
        .route("/applications/{application}/versions", get(registry::list_versions))
        .route("/download-image/{application}/{version}", get(registry::download_image))
        .with_state(state);

    Router::new().nest("/cluster", cluster)
}

/// Build the gateway router.
pub fn gateway_router(state: GatewayState) -> Router {
    let gateway = Router::new()
        .route("/reload", post(gateway::reload))
        .route("/ssl", post(gateway::ssl))
        .route("/routes", get(gateway::routes))
        .with_state(state);

    Router::new().nest("/gateway", gateway)
}
