//! `/matches` HTTP endpoints.
//!
//! `POST /matches` is the write path that feeds the hub: a match is announced
//! only after the store has committed it.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use matchcast_core::errors::{FieldIssue, ValidationError};
use matchcast_core::matches::{CreateMatchRequest, Match, parse_list_limit};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::metrics::MATCHES_CREATED_TOTAL;
use crate::server::AppState;
use crate::store::StoreError;

/// Error responses of the match endpoints.
#[derive(Debug)]
pub enum ApiError {
    /// Body failed validation.
    InvalidPayload(Vec<FieldIssue>),
    /// Query string failed validation.
    InvalidQuery(Vec<FieldIssue>),
    /// Store write failed.
    CreateFailed(StoreError),
    /// Store read failed.
    ListFailed(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::InvalidPayload(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid payload", "details": details }),
            ),
            Self::InvalidQuery(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid query", "details": details }),
            ),
            Self::CreateFailed(e) => {
                error!(error = %e, "failed to create match");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to create match" }),
                )
            }
            Self::ListFailed(e) => {
                error!(error = %e, "failed to list matches");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to list matches" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Query string of `GET /matches`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Raw page size; validated by [`parse_list_limit`].
    pub limit: Option<String>,
}

/// POST /matches
pub async fn create_match(
    State(state): State<AppState>,
    payload: Result<Json<CreateMatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected match payload");
        ApiError::InvalidPayload(vec![FieldIssue::new("body", rejection.body_text())])
    })?;

    let new_match = request.validate().map_err(|ValidationError { issues }| {
        warn!(issues = issues.len(), "invalid match payload");
        ApiError::InvalidPayload(issues)
    })?;

    let record = state
        .store
        .create(new_match)
        .await
        .map_err(ApiError::CreateFailed)?;
    counter!(MATCHES_CREATED_TOTAL).increment(1);
    info!(match_id = record.id, status = record.status.as_str(), "match created");

    announce(&state, &record);
    Ok((StatusCode::CREATED, Json(json!({ "data": record }))))
}

/// GET /matches
pub async fn list_matches(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = parse_list_limit(query.limit.as_deref())
        .map_err(|ValidationError { issues }| ApiError::InvalidQuery(issues))?;
    let rows = state
        .store
        .list(limit)
        .await
        .map_err(ApiError::ListFailed)?;
    Ok(Json(json!({ "data": rows })))
}

// Publish failures are logged only; the record is already committed.
fn announce(state: &AppState, record: &Match) {
    if let Err(e) = state.hub.broadcast_match_created(record.clone()) {
        error!(match_id = record.id, error = %e, "failed to broadcast match");
    }
}
