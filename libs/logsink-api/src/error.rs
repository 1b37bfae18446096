use std::fmt;

/// Category of a storage error. Lets callers tell a misconfigured store
/// apart from a transient I/O failure or corrupted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration (bad URI, bad collection name). Fail at startup.
    Config,
    /// I/O or network error.
    Io,
    /// Stored data could not be encoded or decoded.
    Format,
    /// Logical error (invalid state, generic).
    Logic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Logic => f.write_str("logic"),
        }
    }
}

/// Error returned by every `Collection` / `Database` operation.
///
/// `From` impls assign the kind automatically so backends can use `?`
/// on `std::io` and `serde_json` results.
#[derive(Clone)]
pub struct StoreError {
    kind: ErrorKind,
    message: String,
}

impl StoreError {
    /// Generic logic error.
    pub fn new(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logic, message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with `ctx`, keeping the kind.
    ///
    /// Produces: `"context: message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Debug for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self { Self::io(e.to_string()) }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self { Self::format(e.to_string()) }
}
