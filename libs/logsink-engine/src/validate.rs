use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use logsink_api::{Batch, Collection, StoreError, USER_ID_FIELD};

use crate::error::IngestError;

/// Point lookups against the set of known users.
pub trait UserDirectory: Send + Sync {
    fn exists<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>>;
}

/// Directory backed by a user collection: a user exists when some document
/// has a matching `user_id` field.
pub struct CollectionDirectory {
    users: Arc<dyn Collection>,
}

impl CollectionDirectory {
    pub fn new(users: Arc<dyn Collection>) -> Self {
        Self { users }
    }
}

impl UserDirectory for CollectionDirectory {
    fn exists<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>> {
        self.users.exists_by(USER_ID_FIELD, user_id)
    }
}

/// Keeps only records whose owner is known to the directory.
pub struct RecordValidator {
    directory: Arc<dyn UserDirectory>,
}

impl RecordValidator {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Filter `batch` down to records with a known `user_id`, preserving order.
    ///
    /// One lookup per record, sequentially, with no memoization inside a
    /// request. A lookup failure fails the whole batch. An empty result is
    /// `NoValidRecords`.
    pub async fn filter(&self, batch: Batch) -> Result<Batch, IngestError> {
        let received = batch.len();
        let mut valid = Vec::with_capacity(received);

        for (i, record) in batch.into_iter().enumerate() {
            let Some(user_id) = record.user_id() else {
                tracing::debug!(index = i, "dropping record without user_id");
                continue;
            };
            if self.directory.exists(user_id).await? {
                valid.push(record);
            } else {
                tracing::debug!(index = i, user_id = %user_id, "dropping record with unknown user_id");
            }
        }

        if valid.is_empty() {
            tracing::warn!(received, "no valid user_id found in batch, dropping");
            return Err(IngestError::NoValidRecords { received });
        }

        tracing::debug!(received, valid = valid.len(), "validated batch");
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use logsink_api::LogRecord;
    use serde_json::{json, Value};

    struct StaticDirectory {
        known: HashSet<&'static str>,
        lookups: AtomicUsize,
    }

    impl StaticDirectory {
        fn new(known: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                known: known.iter().copied().collect(),
                lookups: AtomicUsize::new(0),
            })
        }
    }

    impl UserDirectory for StaticDirectory {
        fn exists<'a>(
            &'a self,
            user_id: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(self.known.contains(user_id)) })
        }
    }

    struct BrokenDirectory;

    impl UserDirectory for BrokenDirectory {
        fn exists<'a>(
            &'a self,
            _user_id: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>> {
            Box::pin(async { Err(StoreError::io("connection reset")) })
        }
    }

    fn batch(values: Vec<Value>) -> Batch {
        values.into_iter().map(|v| LogRecord::from_value(v).unwrap()).collect()
    }

    #[tokio::test]
    async fn keeps_known_users_in_order() {
        let dir = StaticDirectory::new(&["u1", "u3"]);
        let validator = RecordValidator::new(dir.clone());

        let input = batch(vec![
            json!({"user_id": "u1", "n": 1}),
            json!({"user_id": "u2", "n": 2}),
            json!({"n": 3}),
            json!({"user_id": "u3", "n": 4}),
            json!({"user_id": "u1", "n": 5}),
        ]);
        let out = validator.filter(input).await.unwrap();
        let ns: Vec<_> = out.iter().map(|r| r.get("n").cloned().unwrap()).collect();

        assert_eq!(ns, vec![json!(1), json!(4), json!(5)]);
        // Records without a user_id never reach the directory; repeats are not cached.
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn empty_or_non_string_user_id_is_dropped() {
        let dir = StaticDirectory::new(&["", "7"]);
        let validator = RecordValidator::new(dir.clone());

        let input = batch(vec![json!({"user_id": ""}), json!({"user_id": 7})]);
        match validator.filter(input).await {
            Err(IngestError::NoValidRecords { received: 2 }) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn inclusion_ignores_other_fields() {
        let validator = RecordValidator::new(StaticDirectory::new(&["u1"]));
        let input = batch(vec![
            json!({"user_id": "u1", "level": "error", "nested": {"user_id": "nobody"}}),
            json!({"user_id": "u1"}),
        ]);
        assert_eq!(validator.filter(input).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_batch_is_no_valid_records() {
        let validator = RecordValidator::new(StaticDirectory::new(&["u1"]));
        assert!(matches!(
            validator.filter(Vec::new()).await,
            Err(IngestError::NoValidRecords { received: 0 })
        ));
    }

    #[tokio::test]
    async fn lookup_failure_fails_batch() {
        let validator = RecordValidator::new(Arc::new(BrokenDirectory));
        let input = batch(vec![json!({"user_id": "u1"})]);
        assert!(matches!(validator.filter(input).await, Err(IngestError::Storage(_))));
    }

    #[tokio::test]
    async fn collection_directory_uses_user_id_field() {
        let db = storage_memory::MemoryDatabase::new("logs");
        let users = db.memory_collection("users").await.unwrap();
        users
            .insert_many(batch(vec![json!({"user_id": "u1", "name": "Ada"})]))
            .await
            .unwrap();

        let directory = CollectionDirectory::new(users);
        assert!(directory.exists("u1").await.unwrap());
        assert!(!directory.exists("Ada").await.unwrap());
    }
}
