//! # pseudonfs-client
//!
//! Talks to a pseudonfs export server.
//!
//! [`Session`] mounts an export and exposes each protocol operation as an
//! async method, plus path walking on top of Lookup. The `pnfs` binary wraps
//! it as a small command-line tool.

pub mod constants;
pub mod error;
pub mod path;
pub mod session;

pub use error::{ClientError, ClientResult};
pub use session::Session;
