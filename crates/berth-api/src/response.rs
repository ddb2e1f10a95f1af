//! Response envelope and error-to-status mapping shared by both surfaces.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use berth_gateway::GatewayError;
use berth_registry::{RegistryError, StoreError};
use tracing::error;

/// Response wrapper for consistent API format.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// A failed request: status plus message, rendered as an envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalid credential")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        }
        error_response(&self.message, self.status)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = match &err {
            RegistryError::InvalidCredential => StatusCode::UNAUTHORIZED,
            RegistryError::DuplicateName { .. }
            | RegistryError::DuplicateVersion { .. }
            | RegistryError::ArtifactExists { .. }
            | RegistryError::AlreadyInstalled => StatusCode::CONFLICT,
            RegistryError::MissingField(_) | RegistryError::InvalidName(_) => StatusCode::BAD_REQUEST,
            RegistryError::UnknownApplication(_)
            | RegistryError::UnknownVersion { .. }
            | RegistryError::ArtifactMissing { .. } => StatusCode::NOT_FOUND,
            RegistryError::NotInstalled => StatusCode::SERVICE_UNAVAILABLE,
            // The client's body broke off mid-upload.
            RegistryError::Store(StoreError::Stream { .. }) => StatusCode::BAD_REQUEST,
            RegistryError::Corrupt { .. } | RegistryError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::InvalidCredential => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidHost(_) => StatusCode::BAD_REQUEST,
            GatewayError::ExternalToolFailure { .. } | GatewayError::Spawn { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::ToolTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::AlreadyRegistered(_) => StatusCode::CONFLICT,
            GatewayError::UnknownGateway(_) => StatusCode::NOT_FOUND,
            GatewayError::NotConfigured(_)
            | GatewayError::Io { .. }
            | GatewayError::Parse(_)
            | GatewayError::Render(_)
            | GatewayError::Registration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}
