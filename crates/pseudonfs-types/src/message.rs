//! Requests, replies, and the response envelope.
//!
//! A [`Request`] carries one of nine operations. A [`Response`] either holds
//! the matching [`Reply`] (status Ok) or just the echoed [`OpKind`] (status
//! Err). The protocol never says why an operation failed.

use crate::error::{WireError, WireResult};
use crate::ids::ObjectId;
use crate::object::{DataBlock, Descriptor, DirEntry, Name, ObjectKind};

/// Operation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum OpKind {
    Create,
    Link,
    Unlink,
    Read,
    Write,
    List,
    RemoveDirectory,
    Lookup,
    Mount,
}

impl OpKind {
    /// Wire tag byte.
    pub fn tag(self) -> u8 {
        match self {
            OpKind::Create => 1,
            OpKind::Link => 2,
            OpKind::Unlink => 3,
            OpKind::Read => 4,
            OpKind::Write => 5,
            OpKind::List => 6,
            OpKind::RemoveDirectory => 7,
            OpKind::Lookup => 8,
            OpKind::Mount => 9,
        }
    }

    pub fn from_tag(tag: u8) -> WireResult<Self> {
        Ok(match tag {
            1 => OpKind::Create,
            2 => OpKind::Link,
            3 => OpKind::Unlink,
            4 => OpKind::Read,
            5 => OpKind::Write,
            6 => OpKind::List,
            7 => OpKind::RemoveDirectory,
            8 => OpKind::Lookup,
            9 => OpKind::Mount,
            other => return Err(WireError::UnknownOp(other)),
        })
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Err,
}

impl Status {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::Err => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> WireResult<Self> {
        match tag {
            0 => Ok(Status::Ok),
            1 => Ok(Status::Err),
            other => Err(WireError::UnknownStatus(other)),
        }
    }
}

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Create {
        parent: ObjectId,
        name: Name,
        kind: ObjectKind,
    },
    Link {
        parent: ObjectId,
        source: ObjectId,
        name: Name,
    },
    Unlink {
        parent: ObjectId,
        name: Name,
    },
    Read {
        id: ObjectId,
    },
    Write {
        id: ObjectId,
        data: DataBlock,
    },
    List {
        id: ObjectId,
    },
    RemoveDirectory {
        parent: ObjectId,
        name: Name,
    },
    Lookup {
        parent: ObjectId,
        name: Name,
    },
    Mount,
}

impl Request {
    pub fn op(&self) -> OpKind {
        match self {
            Request::Create { .. } => OpKind::Create,
            Request::Link { .. } => OpKind::Link,
            Request::Unlink { .. } => OpKind::Unlink,
            Request::Read { .. } => OpKind::Read,
            Request::Write { .. } => OpKind::Write,
            Request::List { .. } => OpKind::List,
            Request::RemoveDirectory { .. } => OpKind::RemoveDirectory,
            Request::Lookup { .. } => OpKind::Lookup,
            Request::Mount => OpKind::Mount,
        }
    }

    /// Every identifier field, in field order.
    pub fn ids(&self) -> Vec<ObjectId> {
        match self {
            Request::Link { parent, source, .. } => vec![*parent, *source],
            Request::Create { parent, .. }
            | Request::Unlink { parent, .. }
            | Request::RemoveDirectory { parent, .. }
            | Request::Lookup { parent, .. } => vec![*parent],
            Request::Read { id } | Request::Write { id, .. } | Request::List { id } => vec![*id],
            Request::Mount => Vec::new(),
        }
    }

    /// Rewrite every identifier field through `f`, stopping at the first error.
    pub fn try_map_ids<E>(
        self,
        mut f: impl FnMut(ObjectId) -> Result<ObjectId, E>,
    ) -> Result<Self, E> {
        Ok(match self {
            Request::Create { parent, name, kind } => Request::Create {
                parent: f(parent)?,
                name,
                kind,
            },
            Request::Link {
                parent,
                source,
                name,
            } => Request::Link {
                parent: f(parent)?,
                source: f(source)?,
                name,
            },
            Request::Unlink { parent, name } => Request::Unlink {
                parent: f(parent)?,
                name,
            },
            Request::Read { id } => Request::Read { id: f(id)? },
            Request::Write { id, data } => Request::Write { id: f(id)?, data },
            Request::List { id } => Request::List { id: f(id)? },
            Request::RemoveDirectory { parent, name } => Request::RemoveDirectory {
                parent: f(parent)?,
                name,
            },
            Request::Lookup { parent, name } => Request::Lookup {
                parent: f(parent)?,
                name,
            },
            Request::Mount => Request::Mount,
        })
    }
}

/// Payload of a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Create { id: ObjectId },
    Link,
    Unlink,
    Read { data: DataBlock },
    Write,
    List { entries: Vec<DirEntry> },
    RemoveDirectory,
    Lookup { object: Descriptor },
    Mount { root: Descriptor },
}

impl Reply {
    pub fn op(&self) -> OpKind {
        match self {
            Reply::Create { .. } => OpKind::Create,
            Reply::Link => OpKind::Link,
            Reply::Unlink => OpKind::Unlink,
            Reply::Read { .. } => OpKind::Read,
            Reply::Write => OpKind::Write,
            Reply::List { .. } => OpKind::List,
            Reply::RemoveDirectory => OpKind::RemoveDirectory,
            Reply::Lookup { .. } => OpKind::Lookup,
            Reply::Mount { .. } => OpKind::Mount,
        }
    }

    /// Every identifier field, including one per List entry.
    pub fn ids(&self) -> Vec<ObjectId> {
        match self {
            Reply::Create { id } => vec![*id],
            Reply::List { entries } => entries.iter().map(|e| e.object.id).collect(),
            Reply::Lookup { object } => vec![object.id],
            Reply::Mount { root } => vec![root.id],
            Reply::Link
            | Reply::Unlink
            | Reply::Read { .. }
            | Reply::Write
            | Reply::RemoveDirectory => Vec::new(),
        }
    }

    /// Rewrite every identifier field through `f`, stopping at the first error.
    ///
    /// List entries are rewritten one by one.
    pub fn try_map_ids<E>(
        self,
        mut f: impl FnMut(ObjectId) -> Result<ObjectId, E>,
    ) -> Result<Self, E> {
        Ok(match self {
            Reply::Create { id } => Reply::Create { id: f(id)? },
            Reply::List { entries } => Reply::List {
                entries: entries
                    .into_iter()
                    .map(|entry| -> Result<DirEntry, E> {
                        Ok(DirEntry {
                            object: Descriptor {
                                id: f(entry.object.id)?,
                                kind: entry.object.kind,
                            },
                            name: entry.name,
                        })
                    })
                    .collect::<Result<Vec<_>, E>>()?,
            },
            Reply::Lookup { object } => Reply::Lookup {
                object: Descriptor {
                    id: f(object.id)?,
                    kind: object.kind,
                },
            },
            Reply::Mount { root } => Reply::Mount {
                root: Descriptor {
                    id: f(root.id)?,
                    kind: root.kind,
                },
            },
            other => other,
        })
    }
}

/// A complete response: echoed operation plus status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Status Ok with the operation's reply payload.
    Ok(Reply),
    /// Status Err; payload is zeroed on the wire.
    Err(OpKind),
}

impl Response {
    pub fn op(&self) -> OpKind {
        match self {
            Response::Ok(reply) => reply.op(),
            Response::Err(op) => *op,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Response::Ok(_) => Status::Ok,
            Response::Err(_) => Status::Err,
        }
    }
}
