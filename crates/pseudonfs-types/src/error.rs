//! Wire error types.

use thiserror::Error;

use crate::{MAX_DATA_LEN, MAX_LIST_ENTRIES, MAX_NAME_LEN};

/// A frame or payload value that does not fit the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Frame length differs from the fixed request/response size.
    #[error("frame is {got} bytes, expected {expected}")]
    FrameSize { expected: usize, got: usize },

    /// Operation tag outside the nine known kinds.
    #[error("unknown operation tag {0}")]
    UnknownOp(u8),

    /// Object kind byte outside File/Directory.
    #[error("unknown object kind {0}")]
    UnknownKind(u8),

    /// Status byte outside Ok/Err.
    #[error("unknown status {0}")]
    UnknownStatus(u8),

    /// Empty name, `.`/`..`, or a name containing `/` or NUL.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Name longer than [`MAX_NAME_LEN`].
    #[error("name is {0} bytes, limit is {max}", max = MAX_NAME_LEN)]
    NameTooLong(usize),

    /// Data block longer than [`MAX_DATA_LEN`].
    #[error("data block is {0} bytes, limit is {max}", max = MAX_DATA_LEN)]
    DataTooLarge(usize),

    /// Listing with more than [`MAX_LIST_ENTRIES`] entries.
    #[error("listing has {0} entries, limit is {max}", max = MAX_LIST_ENTRIES)]
    TooManyEntries(usize),
}

impl WireError {
    /// Create an InvalidName error.
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName(name.into())
    }

    /// True for errors that mean a payload exceeded a fixed bound.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            Self::NameTooLong(_) | Self::DataTooLarge(_) | Self::TooManyEntries(_)
        )
    }
}

/// Wire result type.
pub type WireResult<T> = Result<T, WireError>;
