//! Engine error types.
//!
//! The wire protocol only knows Ok and Err. These variants exist so the
//! server can log what actually went wrong.

use std::io;

use pseudonfs_types::{MAX_LIST_ENTRIES, ObjectId, WireError};
use thiserror::Error;

/// Engine error type.
#[derive(Debug, Error)]
pub enum FsError {
    /// Resolution walked the whole tree without finding the identifier.
    #[error("object {0} not found in served tree")]
    NotFound(ObjectId),

    /// The host filesystem primitive failed (permission, collision, not empty, ...).
    #[error("{op} failed: {source}")]
    Operation {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// Opening or enumerating an entry failed mid-search.
    #[error("tree search failed: {0}")]
    Resolve(#[source] io::Error),

    /// Directory holds more entries than one List reply can carry.
    #[error("listing exceeds {max} entries", max = MAX_LIST_ENTRIES)]
    TooManyEntries,

    /// A non-root object's real identifier equals the root sentinel.
    #[error("object {0} collides with the root sentinel")]
    SentinelCollision(ObjectId),

    /// The configured root cannot be served.
    #[error("cannot serve root: {0}")]
    InvalidRoot(String),

    /// A host value does not fit the wire protocol.
    #[error("wire limit: {0}")]
    Wire(#[from] WireError),
}

/// Coarse error taxonomy, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Operation,
    Capacity,
}

impl FsError {
    /// Create an Operation error from an errno or io error.
    pub fn operation(op: &'static str, source: impl Into<io::Error>) -> Self {
        Self::Operation {
            op,
            source: source.into(),
        }
    }

    /// Create a Resolve error from an errno or io error.
    pub fn resolve(source: impl Into<io::Error>) -> Self {
        Self::Resolve(source.into())
    }

    /// Create an InvalidRoot error.
    pub fn invalid_root(msg: impl Into<String>) -> Self {
        Self::InvalidRoot(msg.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            FsError::NotFound(_) => ErrorClass::NotFound,
            FsError::TooManyEntries => ErrorClass::Capacity,
            FsError::Wire(e) if e.is_capacity() => ErrorClass::Capacity,
            FsError::Operation { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                ErrorClass::NotFound
            }
            FsError::Operation { .. }
            | FsError::Resolve(_)
            | FsError::SentinelCollision(_)
            | FsError::InvalidRoot(_)
            | FsError::Wire(_) => ErrorClass::Operation,
        }
    }
}

/// Engine result type.
pub type FsResult<T> = Result<T, FsError>;
