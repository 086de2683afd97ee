//! Error taxonomy for the storage engine.
//!
//! Kept as a closed, hand-rolled enum rather than built on `thiserror`,
//! matching the house style of this lineage: `storage::engine::Engine`
//! and everything layered on it always returns `CResult<T>`, and the
//! retryable/fatal distinction of spec §7 is carried on the value
//! itself via [`Error::retryable`] rather than left for callers to
//! infer from the variant.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum Error {
    /// Underlying OS/filesystem failure. Fatal to the enclosing transaction.
    Io(io::Error),
    /// Data on disk doesn't decode under the expected layout; corruption or a version skew.
    InvalidData(String),
    /// An invariant the engine relies on was violated; should never happen.
    Internal(String),
    /// A catalog or row lookup found nothing.
    NotFound(String),
    /// A catalog create hit an existing name.
    AlreadyExists(String),
    /// A unique index or primary key collided with an existing entry.
    DuplicateKey(String),
    /// A NOT NULL / CHECK constraint rejected a write.
    ConstraintViolation(String),
    /// A value didn't fit the declared column type, or narrowing overflowed.
    TypeMismatch(String),
    /// A CREATE TABLE schema was malformed (bad column/index definition).
    InvalidSchema(String),
    /// Optimistic-concurrency conflict at commit, or a write-write collision. Retryable.
    Conflict(String),
    /// A session or statement deadline elapsed. Retryable.
    DeadlineExceeded(String),
    /// An isolation level or feature the storage engine can't provide.
    NotSupported(String),
    /// A write was attempted under a read-only transaction.
    ReadOnly,
    /// Misc. value-codec failure (compaction rename, log I/O wrapping, etc).
    Value(String),
    /// A serialized value (row, catalog record) failed to parse.
    Parse(String),
}

pub type CResult<T> = Result<T, Error>;

impl Error {
    /// Classifies whether the caller should transparently retry the
    /// statement (spec §7: "transactional retryable" and "timeout"
    /// classes), as opposed to surfacing the error to the client.
    pub fn retryable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::DeadlineExceeded(_))
    }

    /// True for classes spec §7 calls "storage": non-retryable and
    /// fatal to the enclosing transaction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::InvalidData(_) | Error::Internal(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::InvalidData(msg) => write!(f, "invalid data: {}", msg),
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
            Error::NotFound(msg) => write!(f, "not found: {}", msg),
            Error::AlreadyExists(msg) => write!(f, "already exists: {}", msg),
            Error::DuplicateKey(msg) => write!(f, "duplicate key: {}", msg),
            Error::ConstraintViolation(msg) => write!(f, "constraint violation: {}", msg),
            Error::TypeMismatch(msg) => write!(f, "type mismatch: {}", msg),
            Error::InvalidSchema(msg) => write!(f, "invalid schema: {}", msg),
            Error::Conflict(msg) => write!(f, "transaction conflict: {}", msg),
            Error::DeadlineExceeded(msg) => write!(f, "deadline exceeded: {}", msg),
            Error::NotSupported(msg) => write!(f, "not supported: {}", msg),
            Error::ReadOnly => write!(f, "transaction is read-only"),
            Error::Value(msg) => write!(f, "{}", msg),
            Error::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classifies_conflict_and_deadline_only() {
        assert!(Error::Conflict("x".into()).retryable());
        assert!(Error::DeadlineExceeded("x".into()).retryable());
        assert!(!Error::NotFound("x".into()).retryable());
        assert!(!Error::DuplicateKey("x".into()).retryable());
    }

    #[test]
    fn fatal_classifies_storage_errors_only() {
        assert!(Error::Internal("x".into()).is_fatal());
        assert!(!Error::Conflict("x".into()).is_fatal());
        assert!(!Error::NotFound("x".into()).is_fatal());
    }
}
