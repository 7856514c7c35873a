//! Object identifiers.
//!
//! An [`ObjectId`] is the host filesystem's own identity for an object (its
//! inode number). The server never maps it to anything: it is found again by
//! searching the served tree on every request.
//!
//! The served root is special. Its real identifier is never sent to the
//! client; [`ROOT_SENTINEL`] stands in for it on both sides of the wire.
//! Identifiers are not stable across delete/recreate, and the host may hand a
//! freed identifier to a new object. Nothing on the wire detects that reuse.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier the client uses for the root of every mount.
///
/// Matches the FUSE root-id convention.
pub const ROOT_SENTINEL: ObjectId = ObjectId(1);

/// A host object identifier (inode number).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw inode number.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// True if this is the client-side root sentinel.
    pub fn is_root_sentinel(self) -> bool {
        self == ROOT_SENTINEL
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root_sentinel() {
            write!(f, "ObjectId(root)")
        } else {
            write!(f, "ObjectId({})", self.0)
        }
    }
}
