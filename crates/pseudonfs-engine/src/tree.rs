//! The served tree and identifier resolution.
//!
//! The protocol names objects by inode number only, so finding an object
//! means walking the tree from the root until some entry's inode matches.
//! The walk threads directory handles explicitly; the process working
//! directory is never touched.

use std::collections::HashSet;
use std::ffi::{CStr, CString};
use std::fs::File;
use std::io;
use std::path::Path;

use pseudonfs_types::ObjectId;
use rustix::fs::{FileType, Mode, OFlags, RawMode};
use rustix::io::Errno;
use tracing::trace;

use crate::error::{FsError, FsResult};
use crate::handle::{Handle, HandleTracker, ObjectStat};

/// A host directory exported as the root of the remote filesystem.
#[derive(Debug)]
pub struct ServedTree {
    root: Handle,
    root_stat: ObjectStat,
    tracker: HandleTracker,
}

impl ServedTree {
    /// Open `path` as the export root. The handle stays open for the life of
    /// the tree.
    pub fn open(path: impl AsRef<Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let tracker = HandleTracker::new();
        let root = tracker
            .open_dir(path)
            .map_err(|e| FsError::invalid_root(format!("{}: {e}", path.display())))?;
        let root_stat = root
            .stat()
            .map_err(|e| FsError::invalid_root(format!("{}: {e}", path.display())))?;
        Ok(Self {
            root,
            root_stat,
            tracker,
        })
    }

    /// The root directory's real inode number.
    pub fn root_id(&self) -> ObjectId {
        self.root_stat.id
    }

    /// Handles open right now, the root included.
    pub fn live_handles(&self) -> usize {
        self.tracker.live()
    }

    /// Find the object with inode `id`.
    ///
    /// Returns `Ok(None)` when the whole tree was searched without a match.
    /// Symlinks are never followed and each directory is entered at most
    /// once, so the search terminates on any tree. With hard links the first
    /// name reached wins.
    pub fn resolve(&self, id: ObjectId) -> FsResult<Option<Located<'_>>> {
        if id == self.root_stat.id {
            return Ok(Some(Located::Root {
                handle: &self.root,
                stat: self.root_stat,
            }));
        }
        let mut visited = HashSet::from([self.root_stat.dir_key()]);
        let found = search(&self.root, id, &mut visited)?;
        trace!(%id, found = found.is_some(), dirs = visited.len(), "resolve");
        Ok(found)
    }

    /// Like [`resolve`](Self::resolve), but a miss is an error.
    pub fn locate(&self, id: ObjectId) -> FsResult<Located<'_>> {
        self.resolve(id)?.ok_or(FsError::NotFound(id))
    }
}

fn search<'t>(
    dir: &Handle,
    id: ObjectId,
    visited: &mut HashSet<(u64, u64)>,
) -> FsResult<Option<Located<'t>>> {
    let names = dir.entry_names().map_err(FsError::resolve)?;
    for name in names {
        let child = dir.open_child(&name).map_err(FsError::resolve)?;
        let stat = child.stat().map_err(FsError::resolve)?;
        if stat.id == id {
            let parent = dir.duplicate().map_err(FsError::resolve)?;
            return Ok(Some(Located::Entry {
                parent,
                name,
                handle: child,
                stat,
            }));
        }
        if stat.kind.is_dir() && visited.insert(stat.dir_key()) {
            if let Some(found) = search(&child, id, visited)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

/// A resolved object.
///
/// Non-root objects carry their containing directory and entry name, which
/// is what the directory-relative primitives need.
#[derive(Debug)]
pub enum Located<'t> {
    Root {
        handle: &'t Handle,
        stat: ObjectStat,
    },
    Entry {
        parent: Handle,
        name: CString,
        handle: Handle,
        stat: ObjectStat,
    },
}

impl Located<'_> {
    pub fn stat(&self) -> ObjectStat {
        match self {
            Located::Root { stat, .. } | Located::Entry { stat, .. } => *stat,
        }
    }

    pub fn handle(&self) -> &Handle {
        match self {
            Located::Root { handle, .. } => handle,
            Located::Entry { handle, .. } => handle,
        }
    }

    /// Containing directory and entry name; `None` for the root.
    pub fn parent_and_name(&self) -> Option<(&Handle, &CStr)> {
        match self {
            Located::Root { .. } => None,
            Located::Entry { parent, name, .. } => Some((parent, name.as_c_str())),
        }
    }

    /// Open the object again for I/O with `flags`.
    ///
    /// The open never blocks, so a fifo without a peer fails or returns at
    /// once. The returned file is not a traversal handle and is not counted.
    pub fn reopen(&self, flags: OFlags) -> io::Result<File> {
        let flags = flags.union(OFlags::CLOEXEC | OFlags::NONBLOCK);
        let fd = match self {
            Located::Root { handle, .. } => {
                rustix::fs::openat(*handle, c".", flags, Mode::empty())?
            }
            Located::Entry { parent, name, .. } => rustix::fs::openat(
                parent,
                name.as_c_str(),
                flags.union(OFlags::NOFOLLOW),
                Mode::empty(),
            )?,
        };
        Ok(File::from(fd))
    }

    /// Like [`reopen`](Self::reopen), but only regular files are accepted.
    #[allow(clippy::unnecessary_cast)]
    pub fn open_regular(&self, flags: OFlags) -> io::Result<File> {
        let file = self.reopen(flags)?;
        let stat = rustix::fs::fstat(&file)?;
        match FileType::from_raw_mode(stat.st_mode as RawMode) {
            FileType::RegularFile => Ok(file),
            FileType::Directory => Err(Errno::ISDIR.into()),
            _ => Err(Errno::INVAL.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;
    use tempfile::TempDir;

    fn setup() -> (ServedTree, TempDir) {
        let temp = TempDir::new().unwrap();
        let tree = ServedTree::open(temp.path()).unwrap();
        (tree, temp)
    }

    fn ino(path: &Path) -> ObjectId {
        ObjectId::new(std::fs::symlink_metadata(path).unwrap().ino())
    }

    #[test]
    fn test_open_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = ServedTree::open(temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, FsError::InvalidRoot(_)));
    }

    #[test]
    fn test_open_rejects_file_root() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file");
        std::fs::write(&path, b"").unwrap();
        assert!(ServedTree::open(&path).is_err());
    }

    #[test]
    fn test_resolve_root() {
        let (tree, temp) = setup();
        assert_eq!(tree.root_id(), ino(temp.path()));

        let located = tree.resolve(tree.root_id()).unwrap().unwrap();
        assert!(matches!(located, Located::Root { .. }));
        assert!(located.parent_and_name().is_none());
        assert!(located.stat().kind.is_dir());
    }

    #[test]
    fn test_resolve_deep_entry() {
        let (tree, temp) = setup();
        let deep = temp.path().join("a/b/c/d");
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(deep.join("leaf"), b"hi").unwrap();

        let id = ino(&deep.join("leaf"));
        let located = tree.resolve(id).unwrap().unwrap();
        assert_eq!(located.stat().id, id);
        let (parent, name) = located.parent_and_name().unwrap();
        assert_eq!(name, c"leaf");
        assert_eq!(parent.stat().unwrap().id, ino(&deep));
    }

    #[test]
    fn test_resolve_miss_releases_handles() {
        let (tree, temp) = setup();
        for dir in ["x/y", "x/z", "w"] {
            std::fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        std::fs::write(temp.path().join("x/y/f"), b"").unwrap();

        for _ in 0..200 {
            assert!(tree.resolve(ObjectId::new(u64::MAX)).unwrap().is_none());
        }
        assert_eq!(tree.live_handles(), 1);
    }

    #[test]
    fn test_found_entry_releases_handles_on_drop() {
        let (tree, temp) = setup();
        std::fs::create_dir_all(temp.path().join("p/q")).unwrap();
        let id = ino(&temp.path().join("p/q"));
        {
            let located = tree.resolve(id).unwrap().unwrap();
            assert_eq!(located.stat().id, id);
            assert_eq!(tree.live_handles(), 3);
        }
        assert_eq!(tree.live_handles(), 1);
    }

    #[test]
    fn test_symlink_cycle_terminates() {
        let (tree, temp) = setup();
        let sub = temp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::os::unix::fs::symlink(temp.path(), sub.join("up")).unwrap();
        std::os::unix::fs::symlink(&sub, temp.path().join("side")).unwrap();

        assert!(tree.resolve(ObjectId::new(u64::MAX)).unwrap().is_none());
        assert_eq!(tree.live_handles(), 1);
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[test]
    fn test_fifo_does_not_block_search() {
        let (tree, temp) = setup();
        let fifo = temp.path().join("pipe");
        rustix::fs::mknodat(
            rustix::fs::CWD,
            &fifo,
            rustix::fs::FileType::Fifo,
            Mode::RUSR | Mode::WUSR,
            0,
        )
        .unwrap();
        std::fs::write(temp.path().join("after"), b"").unwrap();

        let id = ino(&fifo);
        let located = tree.resolve(id).unwrap().unwrap();
        assert_eq!(located.stat().id, id);
        assert!(tree.resolve(ino(&temp.path().join("after"))).unwrap().is_some());
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[test]
    fn test_open_regular_refuses_fifo_without_blocking() {
        let (tree, temp) = setup();
        let fifo = temp.path().join("pipe");
        rustix::fs::mknodat(
            rustix::fs::CWD,
            &fifo,
            rustix::fs::FileType::Fifo,
            Mode::RUSR | Mode::WUSR,
            0,
        )
        .unwrap();

        let located = tree.locate(ino(&fifo)).unwrap();
        let err = located.open_regular(OFlags::RDONLY).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(Errno::INVAL.raw_os_error()));
        assert!(located.open_regular(OFlags::WRONLY).is_err());
    }

    #[test]
    fn test_unreadable_directory_fails_search() {
        use std::os::unix::fs::PermissionsExt;

        let (tree, temp) = setup();
        let locked = temp.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(locked.join("hidden"), b"").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        let unlock = || {
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap()
        };
        if std::fs::read_dir(&locked).is_ok() {
            // Permission bits do not bind this user (root).
            unlock();
            return;
        }

        let err = tree.resolve(ObjectId::new(u64::MAX)).unwrap_err();
        unlock();
        assert!(matches!(err, FsError::Resolve(_)));
        assert_eq!(tree.live_handles(), 1);
    }

    #[test]
    fn test_locate_miss_is_not_found() {
        let (tree, _temp) = setup();
        let err = tree.locate(ObjectId::new(u64::MAX)).unwrap_err();
        assert!(matches!(err, FsError::NotFound(id) if id.get() == u64::MAX));
    }

    #[test]
    fn test_reopen_root_and_entry() {
        use std::io::Read;

        let (tree, temp) = setup();
        std::fs::write(temp.path().join("f"), b"contents").unwrap();

        let located = tree.locate(ino(&temp.path().join("f"))).unwrap();
        let mut text = String::new();
        located
            .reopen(OFlags::RDONLY)
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "contents");

        let root = tree.locate(tree.root_id()).unwrap();
        assert!(root.reopen(OFlags::RDONLY | OFlags::DIRECTORY).is_ok());
        let err = root.open_regular(OFlags::RDONLY).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(Errno::ISDIR.raw_os_error()));
        assert!(located.open_regular(OFlags::RDONLY).is_ok());
    }
}
