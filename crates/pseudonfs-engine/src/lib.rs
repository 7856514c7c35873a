//! # pseudonfs-engine
//!
//! Serves a host directory tree to pseudonfs clients.
//!
//! - [`ServedTree`] - the export root plus identifier resolution
//! - [`ObjectOps`] - the nine operations, implemented for [`ServedTree`]
//! - [`RootTranslator`] - hides the root's real inode behind the sentinel
//! - [`Dispatcher`] - turns request frames into response frames
//!
//! The engine is synchronous. The server calls it from a blocking task.

pub mod dispatch;
pub mod error;
mod handle;
mod handlers;
pub mod ops;
pub mod translate;
pub mod tree;

pub use dispatch::{Dispatcher, route};
pub use error::{ErrorClass, FsError, FsResult};
pub use handle::{Handle, HandleTracker, ObjectStat};
pub use ops::ObjectOps;
pub use translate::RootTranslator;
pub use tree::{Located, ServedTree};
