//! The operation set a served tree implements.

use pseudonfs_types::{DataBlock, Descriptor, DirEntry, Name, ObjectId, ObjectKind};

use crate::error::FsResult;

/// The nine protocol operations, against real host identifiers.
///
/// Implementors never see the root sentinel; the dispatcher translates
/// identifiers in both directions before and after calling in.
pub trait ObjectOps: Send + Sync {
    // ========================================================================
    // Entries
    // ========================================================================

    /// Create a file or directory called `name` inside `parent`.
    fn create(&self, parent: ObjectId, name: &Name, kind: ObjectKind) -> FsResult<ObjectId>;

    /// Add `name` inside `parent` as a new hard link to `source`.
    fn link(&self, parent: ObjectId, source: ObjectId, name: &Name) -> FsResult<()>;

    /// Remove the non-directory entry `name` from `parent`.
    fn unlink(&self, parent: ObjectId, name: &Name) -> FsResult<()>;

    /// Remove the empty directory `name` from `parent`.
    fn remove_directory(&self, parent: ObjectId, name: &Name) -> FsResult<()>;

    fn lookup(&self, parent: ObjectId, name: &Name) -> FsResult<Descriptor>;

    // ========================================================================
    // Contents
    // ========================================================================

    /// Leading bytes of a file, at most one data block.
    fn read(&self, id: ObjectId) -> FsResult<DataBlock>;

    /// Replace a file's contents with `data`.
    fn write(&self, id: ObjectId, data: &DataBlock) -> FsResult<()>;

    fn list(&self, id: ObjectId) -> FsResult<Vec<DirEntry>>;

    // ========================================================================
    // Session
    // ========================================================================

    /// Descriptor of the served root, with its real identifier.
    fn mount(&self) -> FsResult<Descriptor>;

    /// Open traversal handles, if the implementation tracks them.
    fn live_handles(&self) -> Option<usize> {
        None
    }
}
