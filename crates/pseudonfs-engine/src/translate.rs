//! Root identity translation.
//!
//! Clients see the served root as [`ROOT_SENTINEL`] no matter what inode it
//! has on the host. Requests are rewritten sentinel-to-real on the way in and
//! replies real-to-sentinel on the way out.

use pseudonfs_types::{ObjectId, ROOT_SENTINEL, Reply, Request};

use crate::error::{FsError, FsResult};

#[derive(Debug, Clone, Copy)]
pub struct RootTranslator {
    real_root: ObjectId,
}

impl RootTranslator {
    pub fn new(real_root: ObjectId) -> Self {
        Self { real_root }
    }

    /// Rewrite every identifier a client sent into a host identifier.
    ///
    /// The root's real inode is not a valid client identifier unless it
    /// happens to equal the sentinel; clients only learn it as the sentinel.
    pub fn inbound(&self, request: Request) -> FsResult<Request> {
        request.try_map_ids(|id| self.to_host(id))
    }

    /// Rewrite every identifier in a reply into what the client should see.
    pub fn outbound(&self, reply: Reply) -> FsResult<Reply> {
        reply.try_map_ids(|id| self.to_client(id))
    }

    fn to_host(&self, id: ObjectId) -> FsResult<ObjectId> {
        if id.is_root_sentinel() {
            Ok(self.real_root)
        } else if id == self.real_root {
            Err(FsError::NotFound(id))
        } else {
            Ok(id)
        }
    }

    fn to_client(&self, id: ObjectId) -> FsResult<ObjectId> {
        if id == self.real_root {
            Ok(ROOT_SENTINEL)
        } else if id.is_root_sentinel() {
            Err(FsError::SentinelCollision(id))
        } else {
            Ok(id)
        }
    }
}
