use std::sync::Arc;

use logsink_api::{Collection, LogRecord};

use crate::error::IngestError;

/// Default number of records returned by the debug read.
pub const DEBUG_READ_LIMIT: usize = 100;

/// Bounded, read-only view of the newest log records.
pub struct DebugReader {
    logs: Arc<dyn Collection>,
    limit: usize,
}

impl DebugReader {
    pub fn new(logs: Arc<dyn Collection>) -> Self {
        Self::with_limit(logs, DEBUG_READ_LIMIT)
    }

    pub fn with_limit(logs: Arc<dyn Collection>, limit: usize) -> Self {
        Self { logs, limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Up to `limit` records, newest first by insertion order.
    pub async fn latest(&self) -> Result<Vec<LogRecord>, IngestError> {
        self.logs.find_latest(self.limit).await.map_err(|e| {
            tracing::error!(collection = %self.logs.name(), error = %e, "fetch latest failed");
            IngestError::from(e)
        })
    }
}
