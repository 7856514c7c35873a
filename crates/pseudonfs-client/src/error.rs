//! Client error types.

use std::io;
use std::net::SocketAddr;

use pseudonfs_types::{OpKind, WireError};
use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The server sent a frame that does not decode.
    #[error("wire error: {0}")]
    Wire(#[source] WireError),

    /// The server answered, but not with what was asked for.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with status Err.
    #[error("server rejected {op}")]
    Rejected { op: OpKind },

    /// A name or data block exceeds what one frame can carry.
    #[error("too large for one request: {0}")]
    Capacity(#[source] WireError),

    #[error("timed out connecting to {0}")]
    Timeout(SocketAddr),

    /// A path that cannot be walked.
    #[error("bad path {0:?}")]
    Path(String),
}

impl ClientError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    /// True when the server processed the request and reported failure.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

impl From<WireError> for ClientError {
    fn from(err: WireError) -> Self {
        if err.is_capacity() {
            Self::Capacity(err)
        } else {
            Self::Wire(err)
        }
    }
}

/// Client result type.
pub type ClientResult<T> = Result<T, ClientError>;
