use std::path::PathBuf;
use std::sync::Arc;

use logsink_api::Database;
use storage_file::FileDatabase;
use storage_memory::MemoryDatabase;

use crate::error::ServerError;

/// Where documents live, parsed from `store_uri`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUri {
    /// `memory://[?max_records=N]`
    Memory { max_records: Option<usize> },
    /// `file:///dir` or a bare path
    File { root: PathBuf },
}

impl StoreUri {
    pub fn parse(uri: &str) -> Result<Self, ServerError> {
        let uri = uri.trim();

        if let Some(rest) = uri.strip_prefix("memory://") {
            let query = rest.split_once('?').map(|(_, q)| q).unwrap_or("");
            let mut max_records = None;
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                match pair.split_once('=') {
                    Some(("max_records", n)) => {
                        let n: usize = n.parse().map_err(|_| {
                            ServerError::config("store_uri", format!("max_records: not a number: {n:?}"))
                        })?;
                        if n == 0 {
                            return Err(ServerError::config("store_uri", "max_records must be greater than zero"));
                        }
                        max_records = Some(n);
                    }
                    _ => {
                        return Err(ServerError::config("store_uri", format!("unknown memory option {pair:?}")));
                    }
                }
            }
            return Ok(StoreUri::Memory { max_records });
        }

        let path = match uri.strip_prefix("file://") {
            Some(path) => path,
            None if uri.contains("://") => {
                let scheme = uri.split("://").next().unwrap_or("");
                return Err(ServerError::config(
                    "store_uri",
                    format!("unsupported scheme {scheme:?} (expected memory:// or file://)"),
                ));
            }
            None => uri,
        };
        if path.is_empty() {
            return Err(ServerError::config("store_uri", "empty path"));
        }
        Ok(StoreUri::File { root: PathBuf::from(path) })
    }
}

/// Connect to the database named `db_name`.
pub async fn open_database(uri: &StoreUri, db_name: &str) -> Result<Arc<dyn Database>, ServerError> {
    match uri {
        StoreUri::Memory { max_records } => {
            let mut db = MemoryDatabase::new(db_name);
            if let Some(n) = max_records {
                db = db.with_max_records(*n);
            }
            tracing::info!(backend = "memory", database = %db_name, ?max_records, "opened store");
            Ok(Arc::new(db))
        }
        StoreUri::File { root } => {
            let db = FileDatabase::open(root, db_name).await?;
            tracing::info!(backend = "file", database = %db_name, dir = %db.dir().display(), "opened store");
            Ok(Arc::new(db))
        }
    }
}
