mod format;
mod storage;

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;

use logsink_api::{validate_collection_name, Collection, Database, StoreError};

pub use storage::FileCollection;

// ════════════════════════════════════════════════════════════════
//  FileDatabase
// ════════════════════════════════════════════════════════════════

/// Durable database: one directory per database, one JSON-lines file per
/// collection (`{root}/{db_name}/{collection}.jsonl`).
pub struct FileDatabase {
    name: String,
    dir: PathBuf,
    collections: Mutex<HashMap<String, Arc<FileCollection>>>,
}

impl FileDatabase {
    /// Create `{root}/{name}` if needed.
    pub async fn open(root: impl AsRef<Path>, name: &str) -> Result<Self, StoreError> {
        validate_collection_name(name).map_err(|e| e.with_context("database name"))?;

        let dir = root.as_ref().join(name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(format!("mkdir {}: {e}", dir.display())))?;

        Ok(Self {
            name: name.to_string(),
            dir,
            collections: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Typed handle to a collection. The file is replayed once, on first use.
    pub async fn file_collection(&self, name: &str) -> Result<Arc<FileCollection>, StoreError> {
        validate_collection_name(name)?;

        let mut collections = self.collections.lock().await;
        if let Some(existing) = collections.get(name) {
            return Ok(existing.clone());
        }

        let collection = Arc::new(FileCollection::open(name, &self.dir).await?);
        collections.insert(name.to_string(), collection.clone());
        Ok(collection)
    }
}

impl Database for FileDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<dyn Collection>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let collection: Arc<dyn Collection> = self.file_collection(name).await?;
            Ok(collection)
        })
    }
}
