//! Fixed-size frame encoding.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! request:  op:u8 | payload ............................ | zero pad to REQUEST_SIZE
//! response: op:u8 | status:u8 | payload (Ok only) ...... | zero pad to RESPONSE_SIZE
//!
//! id:         u64
//! kind:       u8 (File=1, Directory=2)
//! name:       len:u8 | bytes[255]
//! data block: len:u32 | bytes[4096]
//! entries:    count:u16 | (name | id | kind)[128]
//! ```
//!
//! Each frame is sized to its largest variant, so the transport can move a
//! constant number of bytes without any length prefix.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{WireError, WireResult};
use crate::ids::ObjectId;
use crate::message::{OpKind, Reply, Request, Response, Status};
use crate::object::{DataBlock, Descriptor, DirEntry, Name, ObjectKind};
use crate::{MAX_DATA_LEN, MAX_LIST_ENTRIES, MAX_NAME_LEN};

const ID_LEN: usize = 8;

/// Length byte plus the padded name bytes.
pub const NAME_FIELD_LEN: usize = 1 + MAX_NAME_LEN;

/// Identifier plus kind byte.
pub const DESCRIPTOR_LEN: usize = ID_LEN + 1;

/// Length word plus the padded data bytes.
pub const DATA_FIELD_LEN: usize = 4 + MAX_DATA_LEN;

/// One directory entry inside a List reply.
pub const ENTRY_LEN: usize = NAME_FIELD_LEN + DESCRIPTOR_LEN;

const LIST_FIELD_LEN: usize = 2 + MAX_LIST_ENTRIES * ENTRY_LEN;

const fn largest(sizes: &[usize]) -> usize {
    let mut max = 0;
    let mut i = 0;
    while i < sizes.len() {
        if sizes[i] > max {
            max = sizes[i];
        }
        i += 1;
    }
    max
}

/// Bytes in every encoded request.
pub const REQUEST_SIZE: usize = 1 + largest(&[
    ID_LEN + NAME_FIELD_LEN + 1,      // create
    ID_LEN + ID_LEN + NAME_FIELD_LEN, // link
    ID_LEN + NAME_FIELD_LEN,          // unlink, remove-directory, lookup
    ID_LEN,                           // read, list
    ID_LEN + DATA_FIELD_LEN,          // write
    0,                                // mount
]);

/// Bytes in every encoded response.
pub const RESPONSE_SIZE: usize = 2 + largest(&[
    ID_LEN,         // create
    DATA_FIELD_LEN, // read
    LIST_FIELD_LEN, // list
    DESCRIPTOR_LEN, // lookup, mount
]);

/// An Err response for a frame that could not be decoded.
///
/// Echoes the raw tag byte even when it names no known operation, so the
/// caller sees a failed call rather than silence.
pub fn rejection(tag: u8) -> Bytes {
    let mut buf = BytesMut::zeroed(RESPONSE_SIZE);
    buf[0] = tag;
    buf[1] = Status::Err.tag();
    buf.freeze()
}

fn check_size(frame: &[u8], expected: usize) -> WireResult<()> {
    if frame.len() != expected {
        return Err(WireError::FrameSize {
            expected,
            got: frame.len(),
        });
    }
    Ok(())
}

// ============================================================================
// Field helpers
// ============================================================================

fn put_id(buf: &mut BytesMut, id: ObjectId) {
    buf.put_u64(id.get());
}

fn get_id(buf: &mut &[u8]) -> ObjectId {
    ObjectId::new(buf.get_u64())
}

fn put_name(buf: &mut BytesMut, name: &Name) {
    // Name guarantees len <= MAX_NAME_LEN (255), so it fits the u8.
    buf.put_u8(name.len() as u8);
    buf.put_slice(name.as_bytes());
    buf.put_bytes(0, MAX_NAME_LEN - name.len());
}

fn get_name(buf: &mut &[u8]) -> WireResult<Name> {
    let len = buf.get_u8() as usize;
    let slice: &[u8] = *buf;
    let (field, rest) = slice.split_at(MAX_NAME_LEN);
    *buf = rest;
    if len > MAX_NAME_LEN {
        return Err(WireError::NameTooLong(len));
    }
    Name::new(&field[..len])
}

fn put_descriptor(buf: &mut BytesMut, object: &Descriptor) {
    put_id(buf, object.id);
    buf.put_u8(object.kind.tag());
}

fn get_descriptor(buf: &mut &[u8]) -> WireResult<Descriptor> {
    let id = get_id(buf);
    let kind = ObjectKind::from_tag(buf.get_u8())?;
    Ok(Descriptor { id, kind })
}

fn put_data(buf: &mut BytesMut, data: &DataBlock) {
    buf.put_u32(data.len() as u32);
    buf.put_slice(data.as_slice());
    buf.put_bytes(0, MAX_DATA_LEN - data.len());
}

fn get_data(buf: &mut &[u8]) -> WireResult<DataBlock> {
    let len = buf.get_u32() as usize;
    let slice: &[u8] = *buf;
    let (field, rest) = slice.split_at(MAX_DATA_LEN);
    *buf = rest;
    if len > MAX_DATA_LEN {
        return Err(WireError::DataTooLarge(len));
    }
    DataBlock::new(&field[..len])
}

fn put_entries(buf: &mut BytesMut, entries: &[DirEntry]) -> WireResult<()> {
    if entries.len() > MAX_LIST_ENTRIES {
        return Err(WireError::TooManyEntries(entries.len()));
    }
    buf.put_u16(entries.len() as u16);
    for entry in entries {
        put_name(buf, &entry.name);
        put_descriptor(buf, &entry.object);
    }
    buf.put_bytes(0, (MAX_LIST_ENTRIES - entries.len()) * ENTRY_LEN);
    Ok(())
}

fn get_entries(buf: &mut &[u8]) -> WireResult<Vec<DirEntry>> {
    let count = buf.get_u16() as usize;
    if count > MAX_LIST_ENTRIES {
        return Err(WireError::TooManyEntries(count));
    }
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let name = get_name(buf)?;
        let object = get_descriptor(buf)?;
        entries.push(DirEntry { name, object });
    }
    Ok(entries)
}

// ============================================================================
// Requests
// ============================================================================

impl Request {
    /// Encode into exactly [`REQUEST_SIZE`] bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(REQUEST_SIZE);
        buf.put_u8(self.op().tag());
        match self {
            Request::Create { parent, name, kind } => {
                put_id(&mut buf, *parent);
                put_name(&mut buf, name);
                buf.put_u8(kind.tag());
            }
            Request::Link {
                parent,
                source,
                name,
            } => {
                put_id(&mut buf, *parent);
                put_id(&mut buf, *source);
                put_name(&mut buf, name);
            }
            Request::Unlink { parent, name }
            | Request::RemoveDirectory { parent, name }
            | Request::Lookup { parent, name } => {
                put_id(&mut buf, *parent);
                put_name(&mut buf, name);
            }
            Request::Read { id } | Request::List { id } => put_id(&mut buf, *id),
            Request::Write { id, data } => {
                put_id(&mut buf, *id);
                put_data(&mut buf, data);
            }
            Request::Mount => {}
        }
        buf.resize(REQUEST_SIZE, 0);
        buf.freeze()
    }

    /// Decode a frame of exactly [`REQUEST_SIZE`] bytes.
    pub fn decode(frame: &[u8]) -> WireResult<Self> {
        check_size(frame, REQUEST_SIZE)?;
        let mut buf = frame;
        let op = OpKind::from_tag(buf.get_u8())?;
        Ok(match op {
            OpKind::Create => {
                let parent = get_id(&mut buf);
                let name = get_name(&mut buf)?;
                let kind = ObjectKind::from_tag(buf.get_u8())?;
                Request::Create { parent, name, kind }
            }
            OpKind::Link => {
                let parent = get_id(&mut buf);
                let source = get_id(&mut buf);
                let name = get_name(&mut buf)?;
                Request::Link {
                    parent,
                    source,
                    name,
                }
            }
            OpKind::Unlink => Request::Unlink {
                parent: get_id(&mut buf),
                name: get_name(&mut buf)?,
            },
            OpKind::Read => Request::Read {
                id: get_id(&mut buf),
            },
            OpKind::Write => Request::Write {
                id: get_id(&mut buf),
                data: get_data(&mut buf)?,
            },
            OpKind::List => Request::List {
                id: get_id(&mut buf),
            },
            OpKind::RemoveDirectory => Request::RemoveDirectory {
                parent: get_id(&mut buf),
                name: get_name(&mut buf)?,
            },
            OpKind::Lookup => Request::Lookup {
                parent: get_id(&mut buf),
                name: get_name(&mut buf)?,
            },
            OpKind::Mount => Request::Mount,
        })
    }
}

// ============================================================================
// Responses
// ============================================================================

impl Response {
    /// Encode into exactly [`RESPONSE_SIZE`] bytes.
    ///
    /// Fails only for a List reply holding more than [`MAX_LIST_ENTRIES`]
    /// entries, which has no wire representation.
    pub fn encode(&self) -> WireResult<Bytes> {
        let mut buf = BytesMut::with_capacity(RESPONSE_SIZE);
        buf.put_u8(self.op().tag());
        buf.put_u8(self.status().tag());
        if let Response::Ok(reply) = self {
            match reply {
                Reply::Create { id } => put_id(&mut buf, *id),
                Reply::Read { data } => put_data(&mut buf, data),
                Reply::List { entries } => put_entries(&mut buf, entries)?,
                Reply::Lookup { object } => put_descriptor(&mut buf, object),
                Reply::Mount { root } => put_descriptor(&mut buf, root),
                Reply::Link | Reply::Unlink | Reply::Write | Reply::RemoveDirectory => {}
            }
        }
        buf.resize(RESPONSE_SIZE, 0);
        Ok(buf.freeze())
    }

    /// Decode a frame of exactly [`RESPONSE_SIZE`] bytes.
    pub fn decode(frame: &[u8]) -> WireResult<Self> {
        check_size(frame, RESPONSE_SIZE)?;
        let mut buf = frame;
        let op = OpKind::from_tag(buf.get_u8())?;
        if Status::from_tag(buf.get_u8())? == Status::Err {
            return Ok(Response::Err(op));
        }
        let reply = match op {
            OpKind::Create => Reply::Create {
                id: get_id(&mut buf),
            },
            OpKind::Link => Reply::Link,
            OpKind::Unlink => Reply::Unlink,
            OpKind::Read => Reply::Read {
                data: get_data(&mut buf)?,
            },
            OpKind::Write => Reply::Write,
            OpKind::List => Reply::List {
                entries: get_entries(&mut buf)?,
            },
            OpKind::RemoveDirectory => Reply::RemoveDirectory,
            OpKind::Lookup => Reply::Lookup {
                object: get_descriptor(&mut buf)?,
            },
            OpKind::Mount => Reply::Mount {
                root: get_descriptor(&mut buf)?,
            },
        };
        Ok(Response::Ok(reply))
    }
}
