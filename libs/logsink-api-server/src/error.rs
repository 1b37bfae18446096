use axum::Json;
use axum::http::{HeaderValue, StatusCode, header::ALLOW};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use logsink_engine::IngestError;

/// Uniform `{"error": "..."}` body for every failure response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Everything that can end a request early, at the HTTP layer or below.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("no credential presented")]
    Unauthenticated,

    #[error("credential does not match")]
    Forbidden,

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("unsupported content type {content_type:?}")]
    UnsupportedMediaType { content_type: String },

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("no such route")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Ingest(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Ingest(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text sent to the caller. Internal details only go to the log.
    pub fn public_message(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "Unauthorized",
            ApiError::Forbidden => "Forbidden",
            ApiError::PayloadTooLarge { .. } => "Payload Too Large",
            ApiError::UnsupportedMediaType { .. } => "Unsupported Media Type",
            ApiError::MethodNotAllowed => "Method Not Allowed",
            ApiError::NotFound => "Not Found",
            ApiError::Internal(_) => "Internal Server Error",
            ApiError::Ingest(e) => e.public_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }

        let body = ErrorBody {
            error: self.public_message().to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        if matches!(self, ApiError::MethodNotAllowed) {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, POST, OPTIONS"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use logsink_api::StoreError;

    async fn body_of(err: ApiError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn ingest_errors_map_to_status_and_message() {
        let cases = [
            (
                ApiError::from(IngestError::MalformedPayload { detail: "x".into() }),
                400,
                "Invalid JSON payload",
            ),
            (
                ApiError::from(IngestError::NoValidRecords { received: 3 }),
                400,
                "No valid user_id in payload",
            ),
            (ApiError::from(IngestError::EmptyBatch), 400, "No records in payload"),
            (
                ApiError::from(IngestError::Storage(StoreError::io("secret path /var/db"))),
                500,
                "Internal Server Error",
            ),
        ];

        for (err, status, message) in cases {
            let (got_status, body) = body_of(err).await;
            assert_eq!(got_status.as_u16(), status);
            assert_eq!(body.error, message);
        }
    }

    #[tokio::test]
    async fn guard_errors() {
        assert_eq!(body_of(ApiError::Unauthenticated).await.1.error, "Unauthorized");
        assert_eq!(body_of(ApiError::Forbidden).await.0, StatusCode::FORBIDDEN);
    }

    #[test]
    fn method_not_allowed_advertises_methods() {
        let response = ApiError::MethodNotAllowed.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, POST, OPTIONS");
    }
}
