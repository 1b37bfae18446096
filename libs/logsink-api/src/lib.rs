pub mod error;
pub mod record;
pub mod storage;

pub use error::{ErrorKind, StoreError};
pub use record::{Batch, LogRecord, USER_ID_FIELD};
pub use storage::{validate_collection_name, Collection, Database};
