//! Gateway error types.
//!
//! Every failure a request can hit is a [`GatewayError`] variant. The enum
//! implements [`axum::response::IntoResponse`] so handlers can simply return
//! `Err(GatewayError::MissingFilename)` and get the JSON error envelope:
//!
//! ```json
//! { "error": "<summary>", "details": "<message>" }
//! ```

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::config::ConfigError;
use crate::sigv4::SigningError;

/// Methods the presign route accepts.
pub const ALLOWED_METHODS: &[&str] = &["GET"];

/// Summary shown for every server-side failure.
const PRESIGN_FAILED: &str = "Failed to generate presigned URL";

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Request failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Required configuration is absent or invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The `filename` query parameter is absent or empty.
    #[error("Missing filename parameter")]
    MissingFilename,

    /// The `filename` query parameter is present but unusable.
    #[error("Invalid filename parameter")]
    InvalidFilename { details: String },

    /// HTTP method not allowed for this resource.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// No such route.
    #[error("Not Found")]
    NotFound,

    /// A digest or MAC primitive failed.
    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// JSON error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_methods: Option<&'static [&'static str]>,
}

impl GatewayError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Configuration(_) => "configuration",
            GatewayError::MissingFilename => "missing_filename",
            GatewayError::InvalidFilename { .. } => "invalid_filename",
            GatewayError::MethodNotAllowed => "method_not_allowed",
            GatewayError::NotFound => "not_found",
            GatewayError::Signing(_) => "signing",
        }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::MissingFilename => StatusCode::BAD_REQUEST,
            GatewayError::InvalidFilename { .. } => StatusCode::BAD_REQUEST,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the JSON envelope for this error.
    pub fn body(&self) -> ErrorBody {
        match self {
            GatewayError::Configuration(_) | GatewayError::Signing(_) => ErrorBody {
                error: PRESIGN_FAILED.to_string(),
                details: Some(self.to_string()),
                allowed_methods: None,
            },
            GatewayError::InvalidFilename { details } => ErrorBody {
                error: self.to_string(),
                details: Some(details.clone()),
                allowed_methods: None,
            },
            GatewayError::MethodNotAllowed => ErrorBody {
                error: self.to_string(),
                details: None,
                allowed_methods: Some(ALLOWED_METHODS),
            },
            GatewayError::MissingFilename | GatewayError::NotFound => ErrorBody {
                error: self.to_string(),
                details: None,
                allowed_methods: None,
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(kind = self.kind(), "{}", self);
        } else if status != StatusCode::NOT_FOUND {
            warn!(kind = self.kind(), "{}", self);
        }

        let body = Json(self.body());
        if matches!(self, GatewayError::MethodNotAllowed) {
            return (status, [(header::ALLOW, ALLOWED_METHODS.join(", "))], body).into_response();
        }
        (status, body).into_response()
    }
}
