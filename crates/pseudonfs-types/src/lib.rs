//! # pseudonfs-types
//!
//! The wire protocol shared by the pseudonfs server and its clients.
//!
//! Everything that crosses the socket lives here:
//!
//! - [`ObjectId`] and [`ROOT_SENTINEL`] - host object identity as the client sees it
//! - [`Name`], [`DataBlock`], [`Descriptor`], [`DirEntry`] - bounded payload values
//! - [`Request`], [`Reply`], [`Response`] - one variant per [`OpKind`]
//! - [`REQUEST_SIZE`] / [`RESPONSE_SIZE`] - every frame has exactly this many bytes
//!
//! Frames are encoded field by field in network byte order, so a server and a
//! client built independently always agree on the layout.

mod codec;
mod error;
mod ids;
mod message;
mod object;

pub use codec::{
    DATA_FIELD_LEN, DESCRIPTOR_LEN, ENTRY_LEN, NAME_FIELD_LEN, REQUEST_SIZE, RESPONSE_SIZE,
    rejection,
};
pub use error::{WireError, WireResult};
pub use ids::{ObjectId, ROOT_SENTINEL};
pub use message::{OpKind, Reply, Request, Response, Status};
pub use object::{DataBlock, Descriptor, DirEntry, Name, ObjectKind};

/// Longest name, in bytes, a single path component may have.
pub const MAX_NAME_LEN: usize = 255;

/// Largest payload carried by a single Read reply or Write request.
pub const MAX_DATA_LEN: usize = 4096;

/// Most entries a single List reply may carry.
pub const MAX_LIST_ENTRIES: usize = 128;

/// Default TCP port for the export server.
pub const DEFAULT_PORT: u16 = 7049;
