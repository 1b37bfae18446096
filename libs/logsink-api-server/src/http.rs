use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::CONTENT_LENGTH, header::CONTENT_TYPE};

use logsink_api::LogRecord;
use logsink_engine::WireFormat;

use crate::AppState;
use crate::error::ApiError;

// ═══════════════════════════════════════════════════════════════
//  POST /logs
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn post_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let Some(format) = WireFormat::from_content_type(content_type) else {
        return Err(ApiError::UnsupportedMediaType {
            content_type: content_type.to_string(),
        });
    };

    let limit = state.max_body_bytes;
    if declared_length(&headers).is_some_and(|len| len > limit) {
        return Err(ApiError::PayloadTooLarge { limit });
    }

    let bytes = to_bytes(body, limit).await.map_err(|e| {
        tracing::debug!(error = %e, limit, "request body read failed");
        ApiError::PayloadTooLarge { limit }
    })?;

    state.pipeline.ingest(format.payload(&bytes)).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

// ═══════════════════════════════════════════════════════════════
//  GET /logs
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn get_logs(State(state): State<AppState>) -> Result<Json<Vec<LogRecord>>, ApiError> {
    Ok(Json(state.pipeline.recent().await?))
}

// ═══════════════════════════════════════════════════════════════
//  Fallbacks
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub(crate) async fn not_found() -> ApiError {
    ApiError::NotFound
}
