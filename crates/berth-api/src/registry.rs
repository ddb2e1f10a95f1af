//! Registry HTTP handlers, mounted under `/cluster`.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use berth_core::{Credential, SanitizedName, sanitize_name};
use berth_registry::{ByteStream, Registry, RegistryError, RegistryResult, VersionInfo};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::response::{ApiError, ApiResponse};

pub const APPLICATION_HEADER: &str = "cluster-application";
pub const VERSION_HEADER: &str = "cluster-version";
pub const KEY_HEADER: &str = "cluster-key";
pub const WORKER_HEADER: &str = "cluster-worker";

/// Shared state for registry handlers.
#[derive(Clone)]
pub struct RegistryState {
    pub registry: Arc<Registry>,
}

/// A header value as text; absent or non-UTF-8 headers read as empty.
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

// ── Identities ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateIdentityRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityCreated {
    pub name: String,
    pub key: Credential,
}

fn identity_created(result: RegistryResult<(SanitizedName, Credential)>) -> Result<Response, ApiError> {
    let (name, key) = result?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(IdentityCreated {
            name: name.to_string(),
            key,
        }),
    )
        .into_response())
}

/// POST /cluster/create-worker
pub async fn create_worker(
    State(state): State<RegistryState>,
    payload: Result<Json<CreateIdentityRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    identity_created(state.registry.create_worker(&req.key, &req.name).await)
}

/// POST /cluster/create-client
pub async fn create_client(
    State(state): State<RegistryState>,
    payload: Result<Json<CreateIdentityRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    identity_created(state.registry.create_client(&req.key, &req.name).await)
}

/// POST /cluster/create-gateway
pub async fn create_gateway(
    State(state): State<RegistryState>,
    payload: Result<Json<CreateIdentityRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    identity_created(state.registry.create_gateway(&req.key, &req.name).await)
}

// ── Images ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateImageRequest {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageReserved {
    pub application: String,
    pub version: String,
    pub key: Credential,
}

/// POST /cluster/create-image
pub async fn create_image(
    State(state): State<RegistryState>,
    payload: Result<Json<CreateImageRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let key = state
        .registry
        .reserve_version(&req.client, &req.key, &req.application, &req.version)
        .await?;
    let application = sanitize_name(&req.application).map_err(RegistryError::from)?;
    let version = sanitize_name(&req.version).map_err(RegistryError::from)?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(ImageReserved {
            application: application.to_string(),
            version: version.to_string(),
            key,
        }),
    )
        .into_response())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResult {
    pub size: u64,
}

/// POST /cluster/upload-image
///
/// The body is streamed straight into the store; nothing is buffered.
pub async fn upload_image(
    State(state): State<RegistryState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let stream: ByteStream = body.into_data_stream().map_err(std::io::Error::other).boxed();
    let size = state
        .registry
        .upload_artifact(
            header_str(&headers, APPLICATION_HEADER),
            header_str(&headers, VERSION_HEADER),
            header_str(&headers, KEY_HEADER),
            stream,
        )
        .await?;
    Ok(ApiResponse::ok(UploadResult { size }).into_response())
}

// ── Workers ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PingRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResult {
    pub name: String,
    pub last_heartbeat: u64,
}

/// POST /cluster/ping
pub async fn ping(
    State(state): State<RegistryState>,
    payload: Result<Json<PingRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let last_heartbeat = state.registry.heartbeat(&req.name, &req.key).await?;
    let name = sanitize_name(&req.name).map_err(RegistryError::from)?;
    Ok(ApiResponse::ok(PingResult {
        name: name.to_string(),
        last_heartbeat,
    })
    .into_response())
}

/// GET /cluster/applications/{application}/versions
pub async fn list_versions(
    State(state): State<RegistryState>,
    Path(application): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<VersionInfo>>>, ApiError> {
    let versions = state
        .registry
        .list_versions(
            header_str(&headers, WORKER_HEADER),
            header_str(&headers, KEY_HEADER),
            &application,
        )
        .await?;
    Ok(ApiResponse::ok(versions))
}

/// GET /cluster/download-image/{application}/{version}
pub async fn download_image(
    State(state): State<RegistryState>,
    Path((application, version)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let artifact = state
        .registry
        .download_artifact(
            header_str(&headers, WORKER_HEADER),
            header_str(&headers, KEY_HEADER),
            &application,
            &version,
        )
        .await?;
    debug!(%application, %version, size = artifact.size, "streaming artifact");
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, artifact.size.to_string()),
        ],
        Body::from_stream(artifact.stream),
    )
        .into_response())
}
