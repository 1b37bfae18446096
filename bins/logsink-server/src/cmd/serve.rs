use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use logsink_api::{Collection, Database};
use logsink_api_server::{AccessGuard, AppState};
use logsink_engine::IngestPipeline;

use crate::config::{ServeArgs, Settings};
use crate::error::ServerError;
use crate::store::{self, StoreUri};

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("logsink-server starting");

    // --- Load config ---
    let settings = Settings::resolve(args)?;
    tracing::info!(
        port = settings.port,
        database = %settings.db_name,
        validate_users = settings.validate_users,
        max_body_bytes = settings.max_body_bytes,
        "loaded config"
    );

    // --- Connect store, resolve collections ---
    let uri = StoreUri::parse(&settings.store_uri)?;
    let db = store::open_database(&uri, &settings.db_name).await?;
    let logs = db.collection(&settings.log_collection).await?;

    let pipeline = if settings.validate_users {
        let users = db.collection(&settings.user_collection).await?;
        tracing::info!(
            database = %db.name(),
            logs = %logs.name(),
            users = %users.name(),
            "store connected"
        );
        IngestPipeline::with_user_validation(logs, users)
    } else {
        tracing::info!(database = %db.name(), logs = %logs.name(), "store connected");
        IngestPipeline::new(logs)
    };

    let state = AppState::new(Arc::new(pipeline), AccessGuard::new(settings.api_token))
        .with_max_body_bytes(settings.max_body_bytes);

    // --- HTTP API ---
    let token = CancellationToken::new();
    let listener = TcpListener::bind(("0.0.0.0", settings.port)).await?;
    let mut api_handle = tokio::spawn(logsink_api_server::serve(listener, state, token.clone()));
    tracing::info!("server ready, press Ctrl+C to stop");

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down...");
        }
        finished = &mut api_handle => {
            // Server exited without a shutdown request.
            finished??;
            return Ok(());
        }
    }

    token.cancel();
    api_handle.await??;

    tracing::info!("shutdown complete");
    Ok(())
}
