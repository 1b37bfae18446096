use std::future::Future;
use std::pin::Pin;

use logsink_api::{Collection, LogRecord, StoreError};

/// Collection whose every call fails, as a store that lost its disk would.
pub(crate) struct BrokenCollection;

impl Collection for BrokenCollection {
    fn name(&self) -> &str {
        "broken"
    }

    fn insert_many(
        &self,
        _docs: Vec<LogRecord>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async { Err(StoreError::io("write: no space left on device")) })
    }

    fn find_latest(
        &self,
        _limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>, StoreError>> + Send + '_>> {
        Box::pin(async { Err(StoreError::io("read: input/output error")) })
    }

    fn exists_by<'a>(
        &'a self,
        _field: &'a str,
        _value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>> {
        Box::pin(async { Err(StoreError::io("read: input/output error")) })
    }

    fn count(&self) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async { Err(StoreError::io("read: input/output error")) })
    }
}
