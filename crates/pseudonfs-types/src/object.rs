//! Payload values carried inside requests and replies.
//!
//! Every type here enforces the protocol's bounds at construction, so a value
//! that exists always fits in its fixed-size wire field.

use std::ffi::{CStr, CString};
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{WireError, WireResult};
use crate::ids::ObjectId;
use crate::{MAX_DATA_LEN, MAX_NAME_LEN};

/// Object kind.
///
/// Anything on the host that is not a directory is reported as a `File`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ObjectKind {
    File,
    Directory,
}

impl ObjectKind {
    pub(crate) fn tag(self) -> u8 {
        match self {
            ObjectKind::File => 1,
            ObjectKind::Directory => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> WireResult<Self> {
        match tag {
            1 => Ok(ObjectKind::File),
            2 => Ok(ObjectKind::Directory),
            other => Err(WireError::UnknownKind(other)),
        }
    }

    /// Returns true if this is a directory.
    pub fn is_dir(self) -> bool {
        matches!(self, ObjectKind::Directory)
    }
}

/// What a handler tells the client about an object it found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Descriptor {
    pub id: ObjectId,
    pub kind: ObjectKind,
}

impl Descriptor {
    pub fn new(id: ObjectId, kind: ObjectKind) -> Self {
        Self { id, kind }
    }

    /// Descriptor for a file.
    pub fn file(id: ObjectId) -> Self {
        Self::new(id, ObjectKind::File)
    }

    /// Descriptor for a directory.
    pub fn directory(id: ObjectId) -> Self {
        Self::new(id, ObjectKind::Directory)
    }
}

/// A single path component.
///
/// 1 to [`MAX_NAME_LEN`] bytes, no `/` or NUL, and never `.` or `..`. Stored
/// as raw bytes so host names that are not UTF-8 survive a List/Lookup round
/// trip unchanged.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name(CString);

impl Name {
    /// Validate raw bytes as a name.
    pub fn new(bytes: impl Into<Vec<u8>>) -> WireResult<Self> {
        let bytes = bytes.into();
        if bytes.len() > MAX_NAME_LEN {
            return Err(WireError::NameTooLong(bytes.len()));
        }
        if bytes.is_empty() || bytes == b"." || bytes == b".." || bytes.contains(&b'/') {
            return Err(WireError::invalid_name(String::from_utf8_lossy(&bytes)));
        }
        // Interior NUL is the only remaining way to fail.
        CString::new(bytes)
            .map(Self)
            .map_err(|e| WireError::invalid_name(String::from_utf8_lossy(&e.into_vec())))
    }

    /// Validate a host directory entry name.
    pub fn from_c_str(name: &CStr) -> WireResult<Self> {
        Self::new(name.to_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The name as a C string, for `*at` syscalls.
    pub fn as_c_str(&self) -> &CStr {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.as_bytes().len()
    }

    /// Always false; kept for the `len`/`is_empty` pair.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TryFrom<&str> for Name {
    type Error = WireError;

    fn try_from(s: &str) -> WireResult<Self> {
        Self::new(s.as_bytes())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

/// Directory entry: a name and what it points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DirEntry {
    pub name: Name,
    #[serde(flatten)]
    pub object: Descriptor,
}

impl DirEntry {
    pub fn new(name: Name, object: Descriptor) -> Self {
        Self { name, object }
    }
}

/// File content, at most [`MAX_DATA_LEN`] bytes.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DataBlock(Vec<u8>);

impl DataBlock {
    /// Wrap bytes, rejecting anything above [`MAX_DATA_LEN`].
    pub fn new(bytes: impl Into<Vec<u8>>) -> WireResult<Self> {
        let bytes = bytes.into();
        if bytes.len() > MAX_DATA_LEN {
            return Err(WireError::DataTooLarge(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DataBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataBlock({} bytes)", self.0.len())
    }
}
