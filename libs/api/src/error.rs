/// Category of a storage error. Lets the engine and the front end tell
/// an I/O hiccup from on-disk corruption or a closed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid backend configuration — permanent, fail at startup.
    Config,
    /// I/O error from the backend — the caller may retry.
    Io,
    /// Malformed key or value, or a record missing where one must exist.
    Corruption,
    /// The store has been destroyed; no further operations are possible.
    Closed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Corruption => f.write_str("corruption"),
            ErrorKind::Closed => f.write_str("closed"),
        }
    }
}

/// Unified error type for every `KvStore` method.
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// `From` impls assign the appropriate kind automatically and allow
/// ergonomic `?` inside backends.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageError {
    kind: ErrorKind,
    message: String,
}

impl StorageError {
    /// Configuration error — permanent, fail at startup.
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    /// I/O error — transient, may retry.
    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    /// Data does not decode or an invariant of the stored layout is broken.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Corruption, message: msg.into() }
    }

    pub fn closed() -> Self {
        Self { kind: ErrorKind::Closed, message: "store is destroyed".into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self { Self { kind: ErrorKind::Io, message: e.to_string() } }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Config, message: e.to_string() } }
}
