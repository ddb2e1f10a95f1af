//! Gateway HTTP handlers, mounted under `/gateway`.
//!
//! Every call must carry the gateway's cluster credential in the
//! `cluster-key` header.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use berth_core::{Credential, Route};
use berth_gateway::{Edge, ReloadSummary};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::registry::{KEY_HEADER, header_str};
use crate::response::{ApiError, ApiResponse};

/// Shared state for gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub edge: Arc<Edge>,
    pub cluster_key: Credential,
}

impl GatewayState {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        if self.cluster_key.matches(header_str(headers, KEY_HEADER)) {
            Ok(())
        } else {
            warn!(gateway = self.edge.gateway(), "rejected request with bad cluster key");
            Err(ApiError::unauthorized())
        }
    }
}

/// POST /gateway/reload
pub async fn reload(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    payload: Result<Json<Vec<Route>>, JsonRejection>,
) -> Result<Json<ApiResponse<ReloadSummary>>, ApiError> {
    state.authorize(&headers)?;
    let Json(routes) = payload?;
    let summary = state.edge.reload(routes).await?;
    Ok(ApiResponse::ok(summary))
}

fn default_challenge_port() -> u16 {
    80
}

#[derive(Debug, Deserialize)]
pub struct SslRequest {
    pub host: String,
    #[serde(default = "default_challenge_port")]
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SslIssued {
    pub host: String,
}

/// POST /gateway/ssl
///
/// Responds only once the proxy is back up.
pub async fn ssl(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    payload: Result<Json<SslRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SslIssued>>, ApiError> {
    state.authorize(&headers)?;
    let Json(req) = payload?;
    info!(host = %req.host, port = req.port, "certificate requested");
    state.edge.issue_certificate(&req.host, req.port).await?;
    Ok(ApiResponse::ok(SslIssued { host: req.host }))
}

/// GET /gateway/routes
pub async fn routes(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<Route>>>, ApiError> {
    state.authorize(&headers)?;
    Ok(ApiResponse::ok(state.edge.routes()))
}
