use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::RwLock;

use logsink_api::{validate_collection_name, Collection, Database, LogRecord, StoreError};

// ═══════════════════════════════════════════════════════════════
//  MemoryCollection
// ═══════════════════════════════════════════════════════════════

struct StoredDocument {
    seq: u64,
    doc: LogRecord,
}

struct Inner {
    docs: VecDeque<StoredDocument>,
    next_seq: u64,
}

/// In-memory collection. Documents live in insertion order.
///
/// Uncapped (the default), every insert grows `count` by the batch length.
/// With a `max_records` cap the oldest documents are evicted to make room,
/// so once the cap is reached `count` stays at the cap instead of growing.
/// The cap is opt-in and only bounds memory for long-running dev servers.
pub struct MemoryCollection {
    name: String,
    inner: RwLock<Inner>,
    max_records: Option<usize>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>, max_records: Option<usize>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(Inner {
                docs: VecDeque::new(),
                next_seq: 1,
            }),
            max_records,
        }
    }

    /// Sequence number of the newest document, if any.
    pub async fn last_seq(&self) -> Option<u64> {
        self.inner.read().await.docs.back().map(|d| d.seq)
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert_many(
        &self,
        docs: Vec<LogRecord>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            // One write guard for the whole batch: readers never see half of it.
            let mut inner = self.inner.write().await;
            for doc in docs {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                if let Some(max) = self.max_records {
                    if inner.docs.len() >= max {
                        inner.docs.pop_front();
                    }
                }
                inner.docs.push_back(StoredDocument { seq, doc });
            }
            Ok(())
        })
    }

    fn find_latest(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner
                .docs
                .iter()
                .rev()
                .take(limit)
                .map(|d| d.doc.clone())
                .collect())
        })
    }

    fn exists_by<'a>(
        &'a self,
        field: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner.docs.iter().any(|d| d.doc.field_equals(field, value)))
        })
    }

    fn count(&self) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async move { Ok(self.inner.read().await.docs.len() as u64) })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryDatabase
// ═══════════════════════════════════════════════════════════════

/// Process-local database. Nothing survives a restart.
pub struct MemoryDatabase {
    name: String,
    max_records: Option<usize>,
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_records: None,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Cap every collection at `max_records` documents. Inserts past the cap
    /// still succeed but evict the oldest documents, so `count` no longer
    /// grows by the batch length. Leave unset to keep every document.
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    /// Typed handle to a collection, created on first use.
    pub async fn memory_collection(&self, name: &str) -> Result<Arc<MemoryCollection>, StoreError> {
        validate_collection_name(name)?;

        if let Some(existing) = self.collections.read().await.get(name) {
            return Ok(existing.clone());
        }

        let mut collections = self.collections.write().await;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(name, self.max_records)));
        Ok(collection.clone())
    }
}

impl Database for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<dyn Collection>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let collection: Arc<dyn Collection> = self.memory_collection(name).await?;
            Ok(collection)
        })
    }
}
