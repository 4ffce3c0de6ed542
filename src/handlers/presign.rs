//! `GET /presignedUrl` handler.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use garde::Validate;
use metrics::counter;
use tracing::debug;
use utoipa::IntoParams;

use crate::errors::GatewayError;
use crate::metrics::{PRESIGNED_URLS_TOTAL, PRESIGN_FAILURES_TOTAL};
use crate::object_key::ObjectKey;
use crate::presign::{self, PresignedUpload};
use crate::AppState;

/// Longest filename accepted, in bytes.
pub const MAX_FILENAME_LEN: usize = 1024;

/// Query parameters of the presign route.
#[derive(Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PresignQuery {
    /// Desired filename. Only its extension is kept.
    pub filename: Option<String>,
}

impl PresignQuery {
    /// Build from decoded query pairs. A repeated `filename` keeps its first
    /// value; other parameters are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let filename = pairs
            .into_iter()
            .find(|(name, _)| name == "filename")
            .map(|(_, value)| value);
        Self { filename }
    }
}

/// A filename that passed validation.
#[derive(Debug, Validate)]
pub struct FilenameInput {
    #[garde(length(min = 1, max = MAX_FILENAME_LEN))]
    pub filename: String,
}

/// Extract and validate the filename from the parsed query.
pub fn validate_filename(query: PresignQuery) -> Result<String, GatewayError> {
    let filename = match query.filename {
        Some(name) if !name.is_empty() => name,
        _ => return Err(GatewayError::MissingFilename),
    };
    let input = FilenameInput { filename };
    input
        .validate()
        .map_err(|report| GatewayError::InvalidFilename {
            details: report.to_string(),
        })?;
    Ok(input.filename)
}

/// `GET /presignedUrl?filename=<name>` -- Issue a presigned upload URL.
#[utoipa::path(
    get,
    path = "/presignedUrl",
    tag = "Upload",
    operation_id = "CreatePresignedUploadUrl",
    params(PresignQuery),
    responses(
        (status = 200, description = "Presigned upload URL issued", body = PresignedUpload),
        (status = 400, description = "Missing or invalid filename"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Configuration or signing failure")
    )
)]
pub async fn presigned_url(
    State(state): State<Arc<AppState>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let result = issue(&state, query);
    if let Err(err) = &result {
        counter!(PRESIGN_FAILURES_TOTAL, "reason" => err.kind()).increment(1);
    }
    result
}

fn issue(
    state: &AppState,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, GatewayError> {
    // Configuration is checked before anything about the request itself.
    let target = state.config.storage.upload_target()?;

    let Query(pairs) = query.map_err(|rejection| GatewayError::InvalidFilename {
        details: rejection.body_text(),
    })?;
    let filename = validate_filename(PresignQuery::from_pairs(pairs))?;

    // One instant drives the key timestamp, X-Amz-Date and the expiry window.
    let now = Utc::now();
    let key = ObjectKey::generate(&filename, now);
    let upload: PresignedUpload = presign::presign_put(&target, key.as_str(), now)?;

    counter!(PRESIGNED_URLS_TOTAL).increment(1);
    debug!(key = %key, bucket = %target.bucket, expires_in = target.expires_in, "issued presigned upload URL");

    Ok((
        StatusCode::OK,
        [(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            state.config.cors.origin.clone(),
        )],
        Json(upload),
    )
        .into_response())
}
