//! Counted traversal handles.
//!
//! Every descriptor the engine opens while walking the tree is wrapped in a
//! [`Handle`]. Dropping the handle closes the descriptor and decrements the
//! owning [`HandleTracker`], so the dispatcher can check after each request
//! that nothing beyond the root is still open.

use std::ffi::{CStr, CString};
use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pseudonfs_types::{Descriptor, ObjectId, ObjectKind};
use rustix::fs::{AtFlags, Dir, FileType, Mode, OFlags, RawMode, Stat};

/// Flags for descriptors that are only used to identify and traverse.
///
/// `O_PATH` opens without read permission and never blocks on fifos or
/// devices. Elsewhere we fall back to a non-blocking read-only open.
#[cfg(any(target_os = "linux", target_os = "android"))]
const TRAVERSE: OFlags = OFlags::PATH.union(OFlags::CLOEXEC);
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const TRAVERSE: OFlags = OFlags::RDONLY
    .union(OFlags::NONBLOCK)
    .union(OFlags::CLOEXEC);

/// Live-handle counter shared by every handle of one served tree.
#[derive(Debug, Clone, Default)]
pub struct HandleTracker {
    live: Arc<AtomicUsize>,
}

impl HandleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles currently open.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn adopt(&self, fd: OwnedFd) -> Handle {
        self.live.fetch_add(1, Ordering::SeqCst);
        Handle {
            fd,
            tracker: self.clone(),
        }
    }

    /// Open a directory by host path.
    pub fn open_dir(&self, path: &Path) -> io::Result<Handle> {
        let fd = rustix::fs::open(path, TRAVERSE.union(OFlags::DIRECTORY), Mode::empty())?;
        Ok(self.adopt(fd))
    }
}

/// An open descriptor to one host object.
#[derive(Debug)]
pub struct Handle {
    fd: OwnedFd,
    tracker: HandleTracker,
}

impl Handle {
    /// Open `name` relative to this directory, without following symlinks.
    pub fn open_child(&self, name: &CStr) -> io::Result<Handle> {
        let fd = rustix::fs::openat(
            &self.fd,
            name,
            TRAVERSE.union(OFlags::NOFOLLOW),
            Mode::empty(),
        )?;
        Ok(self.tracker.adopt(fd))
    }

    /// A second handle to the same object.
    pub fn duplicate(&self) -> io::Result<Handle> {
        let fd = self.fd.try_clone()?;
        Ok(self.tracker.adopt(fd))
    }

    pub fn stat(&self) -> io::Result<ObjectStat> {
        Ok(ObjectStat::from_stat(&rustix::fs::fstat(&self.fd)?))
    }

    /// Stat `name` in this directory without following symlinks.
    pub fn stat_child(&self, name: &CStr) -> io::Result<ObjectStat> {
        let stat = rustix::fs::statat(&self.fd, name, AtFlags::SYMLINK_NOFOLLOW)?;
        Ok(ObjectStat::from_stat(&stat))
    }

    /// Names in this directory, excluding `.` and `..`.
    ///
    /// The names are collected before returning so the directory stream is
    /// closed by the time the caller opens any child.
    pub fn entry_names(&self) -> io::Result<Vec<CString>> {
        let listing = rustix::fs::openat(
            &self.fd,
            c".",
            OFlags::RDONLY
                .union(OFlags::DIRECTORY)
                .union(OFlags::CLOEXEC),
            Mode::empty(),
        )?;
        let dir = Dir::read_from(&listing)?;
        let mut names = Vec::new();
        for entry in dir {
            let entry = entry?;
            let name = entry.file_name();
            if name == c"." || name == c".." {
                continue;
            }
            names.push(name.to_owned());
        }
        Ok(names)
    }
}

impl AsFd for Handle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.tracker.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The parts of a host stat the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectStat {
    /// Inode number, which is the object's identity on the wire.
    pub id: ObjectId,
    /// Device, used together with the inode to detect directory cycles.
    pub dev: u64,
    pub kind: ObjectKind,
}

impl ObjectStat {
    /// Anything that is not a directory is reported as a file.
    #[allow(clippy::unnecessary_cast)]
    pub fn from_stat(stat: &Stat) -> Self {
        let kind = match FileType::from_raw_mode(stat.st_mode as RawMode) {
            FileType::Directory => ObjectKind::Directory,
            _ => ObjectKind::File,
        };
        Self {
            id: ObjectId::new(stat.st_ino as u64),
            dev: stat.st_dev as u64,
            kind,
        }
    }

    pub fn descriptor(&self) -> Descriptor {
        Descriptor::new(self.id, self.kind)
    }

    pub(crate) fn dir_key(&self) -> (u64, u64) {
        (self.dev, self.id.get())
    }
}
