pub mod auth;
pub mod error;
mod http;
mod layers;

use std::sync::Arc;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::post;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use logsink_engine::IngestPipeline;

pub use auth::{AccessGuard, Credential};
pub use error::{ApiError, ErrorBody};

/// Largest accepted request body unless configured otherwise.
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<IngestPipeline>,
    guard: AccessGuard,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: Arc<IngestPipeline>, guard: AccessGuard) -> Self {
        Self {
            pipeline,
            guard,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// `/logs` behind the access guard, JSON 404/405 fallbacks, CORS and a
/// panic boundary around everything.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/logs",
            post(http::post_logs)
                .get(http::get_logs)
                .fallback(http::method_not_allowed),
        )
        .route_layer(from_fn_with_state(state.clone(), auth::require_token))
        .fallback(http::not_found)
        .with_state(state)
        .layer(from_fn(layers::catch_panic))
        .layer(from_fn(layers::cors))
}

/// Serve on an already bound listener until `shutdown` fires.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, validate_users = state.pipeline.validates_users(), "http api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("http api stopped");
    Ok(())
}

/// Bind `0.0.0.0:<port>` and serve.
pub async fn run(port: u16, state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    serve(listener, state, shutdown).await
}
