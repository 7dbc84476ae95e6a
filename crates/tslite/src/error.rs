//! Error and Result types for TSLite operations.

use thiserror::Error;

/// A convenience `Result` type for TSLite operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for database operations.
///
/// Every variant carries a one-line human readable message. Errors are
/// propagated unchanged from the component that detects them; the CLI layer
/// catches them at the top and prints `Error: <msg>`.
#[derive(Debug, Error)]
pub enum Error {
    /// Database or filter name contains a forbidden symbol.
    #[error("symbols '.:+| \\n\\t/' are not allowed in the database name: {0}")]
    BadName(String),

    /// Malformed timestamp string.
    #[error("{0}")]
    BadTimestamp(String),

    /// Malformed data value.
    #[error("{0}")]
    BadData(String),

    /// Illegal data format or timestamp version.
    #[error("{0}")]
    BadSchema(String),

    /// On-disk record does not match the schema (wrong key or value width,
    /// unknown schema byte). Fatal to the current operation, not to the
    /// handle or the pool.
    #[error("{0}")]
    Corruption(String),

    /// Database file or record not found.
    #[error("{0}")]
    NotFound(String),

    /// Key already exists under the `error` duplicate policy, a database is
    /// already cached in the pool, or a rename destination exists.
    #[error("{0}")]
    Conflict(String),

    /// I/O failure from the filesystem or the underlying ordered store.
    #[error("{0}")]
    Io(String),

    /// Filter evaluation failure.
    #[error("filter: can't run {0}")]
    Filter(String),

    /// Bad command or argument shape on the CLI surface.
    #[error("{0}")]
    Usage(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<redb::DatabaseError> for Error {
    fn from(e: redb::DatabaseError) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<redb::TransactionError> for Error {
    fn from(e: redb::TransactionError) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<redb::TableError> for Error {
    fn from(e: redb::TableError) -> Self {
        match e {
            redb::TableError::TableDoesNotExist(_) => {
                Error::Corruption("Broken database: no data table".to_string())
            }
            other => Error::Io(other.to_string()),
        }
    }
}

impl From<redb::StorageError> for Error {
    fn from(e: redb::StorageError) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<redb::CommitError> for Error {
    fn from(e: redb::CommitError) -> Self {
        Error::Io(e.to_string())
    }
}
