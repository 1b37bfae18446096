use std::sync::Arc;

use logsink_api::{Batch, Collection};

use crate::error::IngestError;

/// Persists a batch into the log collection with one bulk insert.
pub struct BatchWriter {
    logs: Arc<dyn Collection>,
}

impl BatchWriter {
    pub fn new(logs: Arc<dyn Collection>) -> Self {
        Self { logs }
    }

    pub fn logs(&self) -> Arc<dyn Collection> {
        self.logs.clone()
    }

    /// Insert every record of `batch` in one operation and return how many
    /// were written. An empty batch never reaches the store. No retry.
    pub async fn write(&self, batch: Batch) -> Result<usize, IngestError> {
        if batch.is_empty() {
            return Err(IngestError::EmptyBatch);
        }

        let n = batch.len();
        if let Err(e) = self.logs.insert_many(batch).await {
            tracing::error!(collection = %self.logs.name(), records = n, error = %e, "bulk insert failed");
            return Err(e.into());
        }
        Ok(n)
    }
}
