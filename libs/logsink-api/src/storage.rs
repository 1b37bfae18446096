use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::StoreError;
use crate::record::LogRecord;

// ════════════════════════════════════════════════════════════════
//  Storage Traits
// ════════════════════════════════════════════════════════════════

/// A named set of schema-less documents inside a `Database`.
///
/// Every backend keeps documents in insertion order and assigns each one a
/// monotonically increasing sequence number on insert. That order is what
/// "newest first" means; timestamp fields inside documents are never used.
///
/// Implementations must serialize concurrent writers themselves.
pub trait Collection: Send + Sync {
    /// Collection name as configured.
    fn name(&self) -> &str;

    /// Insert all documents as one operation. Either every document becomes
    /// visible to later reads, or an error is returned.
    fn insert_many(
        &self,
        docs: Vec<LogRecord>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Up to `limit` most recently inserted documents, newest first.
    fn find_latest(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>, StoreError>> + Send + '_>>;

    /// `true` if any document has `field` equal to the string `value`.
    fn exists_by<'a>(
        &'a self,
        field: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>>;

    /// Number of stored documents.
    fn count(&self) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>>;
}

/// A connected store holding named collections.
///
/// `collection` returns the same underlying collection for the same name,
/// so handles obtained at different times observe each other's writes.
pub trait Database: Send + Sync {
    /// Database name as configured.
    fn name(&self) -> &str;

    #[allow(clippy::type_complexity)]
    fn collection<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<dyn Collection>, StoreError>> + Send + 'a>>;
}

/// Reject collection names that would escape a backend's namespace.
pub fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::config("collection name must not be empty"));
    }
    if name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        return Err(StoreError::config(format!("invalid collection name '{name}'")));
    }
    Ok(())
}
