use logsink_api::StoreError;

/// Terminal failure of one ingest or read request.
///
/// Every variant fails the whole request; nothing is retried or partially
/// accepted.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The body (or one of its lines) is not JSON, or a record is not an object.
    #[error("invalid JSON payload: {detail}")]
    MalformedPayload { detail: String },

    /// Owner validation dropped every record.
    #[error("no valid user_id in payload ({received} records dropped)")]
    NoValidRecords { received: usize },

    /// Nothing to store and no validation step to blame.
    #[error("no records in payload")]
    EmptyBatch,

    /// Directory lookup, bulk insert or read failed.
    #[error("storage: {0}")]
    Storage(#[from] StoreError),
}

impl IngestError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        IngestError::MalformedPayload { detail: detail.into() }
    }

    /// Message safe to return to the caller. Storage details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            IngestError::MalformedPayload { .. } => "Invalid JSON payload",
            IngestError::NoValidRecords { .. } => "No valid user_id in payload",
            IngestError::EmptyBatch => "No records in payload",
            IngestError::Storage(_) => "Internal Server Error",
        }
    }

    /// `true` when the caller sent something unusable, as opposed to a
    /// failure on our side.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, IngestError::Storage(_))
    }
}
