pub mod error;
pub mod normalize;
pub mod reader;
pub mod validate;
pub mod writer;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use logsink_api::{Collection, LogRecord};

pub use error::IngestError;
pub use normalize::{Payload, WireFormat};
pub use reader::{DebugReader, DEBUG_READ_LIMIT};
pub use validate::{CollectionDirectory, RecordValidator, UserDirectory};
pub use writer::BatchWriter;

// ═══════════════════════════════════════════════════════════════
//  IngestPipeline
// ═══════════════════════════════════════════════════════════════

/// Outcome of a successful ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Records parsed from the payload.
    pub received: usize,
    /// Records written to the log collection.
    pub inserted: usize,
}

/// normalize → (validate) → write, strictly in that order, plus the
/// independent debug read path.
///
/// Holds explicit handles to the collections; nothing is global.
pub struct IngestPipeline {
    validator: Option<RecordValidator>,
    writer: BatchWriter,
    reader: DebugReader,
}

impl IngestPipeline {
    /// Pipeline without owner validation: every parsed record is written.
    pub fn new(logs: Arc<dyn Collection>) -> Self {
        Self {
            validator: None,
            writer: BatchWriter::new(logs.clone()),
            reader: DebugReader::new(logs),
        }
    }

    /// Pipeline that drops records whose `user_id` is not in `users`.
    pub fn with_user_validation(logs: Arc<dyn Collection>, users: Arc<dyn Collection>) -> Self {
        Self::new(logs).with_directory(Arc::new(CollectionDirectory::new(users)))
    }

    /// Enable owner validation against an arbitrary directory.
    pub fn with_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.validator = Some(RecordValidator::new(directory));
        self
    }

    /// Change how many records the debug read returns.
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.reader = DebugReader::with_limit(self.writer.logs(), limit);
        self
    }

    pub fn validates_users(&self) -> bool {
        self.validator.is_some()
    }

    /// Run one request's payload through the pipeline.
    pub async fn ingest(&self, payload: Payload<'_>) -> Result<IngestReport, IngestError> {
        let batch = payload.normalize().inspect_err(|e| {
            tracing::warn!(error = %e, "rejecting malformed payload");
        })?;
        let received = batch.len();

        let batch = match &self.validator {
            Some(validator) => {
                tracing::info!(records = received, "received batch, validating user_id");
                validator.filter(batch).await?
            }
            None => {
                tracing::info!(records = received, "received batch");
                batch
            }
        };

        let inserted = self.writer.write(batch).await?;
        tracing::info!(received, inserted, "inserted records");
        Ok(IngestReport { received, inserted })
    }

    /// Newest records for the debug endpoint.
    pub async fn recent(&self) -> Result<Vec<LogRecord>, IngestError> {
        self.reader.latest().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use storage_memory::{MemoryCollection, MemoryDatabase};

    async fn setup() -> (Arc<MemoryCollection>, Arc<MemoryCollection>) {
        let db = MemoryDatabase::new("logs");
        let logs = db.memory_collection("docker_logs").await.unwrap();
        let users = db.memory_collection("users").await.unwrap();
        users
            .insert_many(vec![LogRecord::from_value(json!({"user_id": "u1"})).unwrap()])
            .await
            .unwrap();
        (logs, users)
    }

    #[tokio::test]
    async fn known_user_is_inserted() {
        let (logs, users) = setup().await;
        let pipeline = IngestPipeline::with_user_validation(logs.clone(), users);

        let body = br#"[{"user_id":"u1","msg":"hi"}]"#;
        let report = pipeline.ingest(Payload::Structured(body)).await.unwrap();

        assert_eq!(report, IngestReport { received: 1, inserted: 1 });
        assert_eq!(logs.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_user_leaves_store_untouched() {
        let (logs, users) = setup().await;
        let pipeline = IngestPipeline::with_user_validation(logs.clone(), users);

        let body = br#"[{"user_id":"ghost","msg":"hi"}]"#;
        let err = pipeline.ingest(Payload::Structured(body)).await.unwrap_err();

        assert!(matches!(err, IngestError::NoValidRecords { received: 1 }));
        assert_eq!(logs.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn partial_batch_keeps_only_valid_records() {
        let (logs, users) = setup().await;
        let pipeline = IngestPipeline::with_user_validation(logs.clone(), users);

        let body = b"{\"user_id\":\"u1\",\"n\":1}\n{\"user_id\":\"u9\",\"n\":2}\n{\"n\":3}\n";
        let report = pipeline.ingest(Payload::LineDelimited(body)).await.unwrap();

        assert_eq!(report, IngestReport { received: 3, inserted: 1 });
        let stored: Vec<Value> = pipeline.recent().await.unwrap().into_iter().map(Value::from).collect();
        assert_eq!(stored, vec![json!({"user_id": "u1", "n": 1})]);
    }

    #[tokio::test]
    async fn without_validation_everything_is_written_in_order() {
        let (logs, _) = setup().await;
        let pipeline = IngestPipeline::new(logs.clone());
        assert!(!pipeline.validates_users());

        let body = b"{\"a\":1}\n{\"a\":2}\n";
        pipeline.ingest(Payload::LineDelimited(body)).await.unwrap();

        let recent: Vec<Value> = pipeline.recent().await.unwrap().into_iter().map(Value::from).collect();
        assert_eq!(recent, vec![json!({"a": 2}), json!({"a": 1})]);
    }

    #[tokio::test]
    async fn empty_payload_without_validation_is_empty_batch() {
        let (logs, _) = setup().await;
        let pipeline = IngestPipeline::new(logs.clone());

        let err = pipeline.ingest(Payload::Structured(b"[]")).await.unwrap_err();
        assert!(matches!(err, IngestError::EmptyBatch));
        assert_eq!(logs.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_json_body_is_empty_batch_not_malformed() {
        let (logs, users) = setup().await;
        let validating = IngestPipeline::with_user_validation(logs.clone(), users);
        let err = validating.ingest(Payload::Structured(b"")).await.unwrap_err();
        assert!(matches!(err, IngestError::NoValidRecords { received: 0 }), "{err:?}");

        let plain = IngestPipeline::new(logs.clone());
        let err = plain.ingest(Payload::Structured(b"\n")).await.unwrap_err();
        assert!(matches!(err, IngestError::EmptyBatch), "{err:?}");
        assert_eq!(logs.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_storage_error() {
        let pipeline = IngestPipeline::new(Arc::new(crate::testing::BrokenCollection));

        let err = pipeline.ingest(Payload::Structured(br#"{"a":1}"#)).await.unwrap_err();
        assert!(matches!(err, IngestError::Storage(_)), "{err:?}");
        assert!(!err.is_client_error());

        let err = pipeline.recent().await.unwrap_err();
        assert_eq!(err.public_message(), "Internal Server Error");
    }

    #[tokio::test]
    async fn resubmission_duplicates_records() {
        let (logs, users) = setup().await;
        let pipeline = IngestPipeline::with_user_validation(logs.clone(), users);

        let body = br#"{"user_id":"u1","msg":"again"}"#;
        pipeline.ingest(Payload::Structured(body)).await.unwrap();
        pipeline.ingest(Payload::Structured(body)).await.unwrap();
        assert_eq!(logs.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn read_limit_is_configurable() {
        let (logs, _) = setup().await;
        let pipeline = IngestPipeline::new(logs).with_read_limit(2);

        pipeline.ingest(Payload::Structured(br#"[{"a":1},{"a":2},{"a":3}]"#)).await.unwrap();
        assert_eq!(pipeline.recent().await.unwrap().len(), 2);
    }
}
