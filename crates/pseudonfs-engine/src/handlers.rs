//! Operation handlers for a host directory tree.
//!
//! Each handler resolves its identifiers, runs one directory-relative host
//! primitive, and lets every handle drop before returning.

use std::io::{Read, Write};

use pseudonfs_types::{
    DataBlock, Descriptor, DirEntry, MAX_DATA_LEN, MAX_LIST_ENTRIES, Name, ObjectId, ObjectKind,
};
use rustix::fs::{AtFlags, Mode, OFlags};
use rustix::io::Errno;

use crate::error::{FsError, FsResult};
use crate::handle::ObjectStat;
use crate::ops::ObjectOps;
use crate::tree::ServedTree;

const FILE_MODE: Mode = Mode::RUSR
    .union(Mode::WUSR)
    .union(Mode::RGRP)
    .union(Mode::ROTH);

const DIR_MODE: Mode = Mode::RWXU
    .union(Mode::RGRP)
    .union(Mode::XGRP)
    .union(Mode::ROTH)
    .union(Mode::XOTH);

impl ObjectOps for ServedTree {
    fn create(&self, parent: ObjectId, name: &Name, kind: ObjectKind) -> FsResult<ObjectId> {
        let dir = self.locate(parent)?;
        let op = "create";
        let stat = match kind {
            ObjectKind::File => {
                let fd = rustix::fs::openat(
                    dir.handle(),
                    name.as_c_str(),
                    OFlags::WRONLY
                        | OFlags::CREATE
                        | OFlags::EXCL
                        | OFlags::NOFOLLOW
                        | OFlags::CLOEXEC,
                    FILE_MODE,
                )
                .map_err(|e| FsError::operation(op, e))?;
                rustix::fs::fstat(&fd).map_err(|e| FsError::operation(op, e))?
            }
            ObjectKind::Directory => {
                rustix::fs::mkdirat(dir.handle(), name.as_c_str(), DIR_MODE)
                    .map_err(|e| FsError::operation(op, e))?;
                rustix::fs::statat(dir.handle(), name.as_c_str(), AtFlags::SYMLINK_NOFOLLOW)
                    .map_err(|e| FsError::operation(op, e))?
            }
        };
        Ok(ObjectStat::from_stat(&stat).id)
    }

    fn link(&self, parent: ObjectId, source: ObjectId, name: &Name) -> FsResult<()> {
        let src = self.locate(source)?;
        let (src_dir, src_name) = src
            .parent_and_name()
            .ok_or_else(|| FsError::operation("link", Errno::PERM))?;
        let dir = self.locate(parent)?;
        rustix::fs::linkat(
            src_dir,
            src_name,
            dir.handle(),
            name.as_c_str(),
            AtFlags::empty(),
        )
        .map_err(|e| FsError::operation("link", e))
    }

    fn unlink(&self, parent: ObjectId, name: &Name) -> FsResult<()> {
        let dir = self.locate(parent)?;
        rustix::fs::unlinkat(dir.handle(), name.as_c_str(), AtFlags::empty())
            .map_err(|e| FsError::operation("unlink", e))
    }

    fn remove_directory(&self, parent: ObjectId, name: &Name) -> FsResult<()> {
        let dir = self.locate(parent)?;
        rustix::fs::unlinkat(dir.handle(), name.as_c_str(), AtFlags::REMOVEDIR)
            .map_err(|e| FsError::operation("remove_directory", e))
    }

    fn lookup(&self, parent: ObjectId, name: &Name) -> FsResult<Descriptor> {
        let dir = self.locate(parent)?;
        let stat = dir
            .handle()
            .stat_child(name.as_c_str())
            .map_err(|e| FsError::operation("lookup", e))?;
        Ok(stat.descriptor())
    }

    fn read(&self, id: ObjectId) -> FsResult<DataBlock> {
        let located = self.locate(id)?;
        let op = "read";
        let file = located
            .open_regular(OFlags::RDONLY)
            .map_err(|e| FsError::operation(op, e))?;
        let mut buf = Vec::with_capacity(MAX_DATA_LEN);
        file.take(MAX_DATA_LEN as u64)
            .read_to_end(&mut buf)
            .map_err(|e| FsError::operation(op, e))?;
        Ok(DataBlock::new(buf)?)
    }

    fn write(&self, id: ObjectId, data: &DataBlock) -> FsResult<()> {
        let located = self.locate(id)?;
        let op = "write";
        let mut file = located
            .open_regular(OFlags::WRONLY | OFlags::TRUNC)
            .map_err(|e| FsError::operation(op, e))?;
        file.write_all(data.as_slice())
            .map_err(|e| FsError::operation(op, e))
    }

    fn list(&self, id: ObjectId) -> FsResult<Vec<DirEntry>> {
        let located = self.locate(id)?;
        let dir = located.handle();
        let names = dir
            .entry_names()
            .map_err(|e| FsError::operation("list", e))?;
        if names.len() > MAX_LIST_ENTRIES {
            return Err(FsError::TooManyEntries);
        }
        names
            .into_iter()
            .map(|raw| -> FsResult<DirEntry> {
                let stat = dir
                    .stat_child(&raw)
                    .map_err(|e| FsError::operation("list", e))?;
                Ok(DirEntry::new(Name::from_c_str(&raw)?, stat.descriptor()))
            })
            .collect()
    }

    fn mount(&self) -> FsResult<Descriptor> {
        Ok(Descriptor::directory(self.root_id()))
    }

    fn live_handles(&self) -> Option<usize> {
        Some(ServedTree::live_handles(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;
    use std::path::Path;

    use crate::error::ErrorClass;
    use tempfile::TempDir;

    fn setup() -> (ServedTree, TempDir) {
        let temp = TempDir::new().unwrap();
        let tree = ServedTree::open(temp.path()).unwrap();
        (tree, temp)
    }

    fn ino(path: &Path) -> ObjectId {
        ObjectId::new(std::fs::symlink_metadata(path).unwrap().ino())
    }

    fn name(s: &str) -> Name {
        Name::try_from(s).unwrap()
    }

    #[test]
    fn test_create_file_and_directory() {
        let (tree, temp) = setup();
        let root = tree.root_id();

        let file = tree.create(root, &name("f"), ObjectKind::File).unwrap();
        assert_eq!(file, ino(&temp.path().join("f")));
        assert!(temp.path().join("f").is_file());

        let dir = tree.create(root, &name("d"), ObjectKind::Directory).unwrap();
        assert_eq!(dir, ino(&temp.path().join("d")));
        assert!(temp.path().join("d").is_dir());

        let nested = tree.create(dir, &name("g"), ObjectKind::File).unwrap();
        assert_eq!(nested, ino(&temp.path().join("d/g")));
        assert_eq!(tree.live_handles(), 1);
    }

    #[test]
    fn test_create_existing_name_fails() {
        let (tree, temp) = setup();
        std::fs::write(temp.path().join("f"), b"keep").unwrap();

        let err = tree
            .create(tree.root_id(), &name("f"), ObjectKind::File)
            .unwrap_err();
        assert!(matches!(err, FsError::Operation { op: "create", .. }));
        assert_eq!(std::fs::read(temp.path().join("f")).unwrap(), b"keep");
    }

    #[test]
    fn test_create_in_missing_parent_is_not_found() {
        let (tree, _temp) = setup();
        let err = tree
            .create(ObjectId::new(u64::MAX), &name("f"), ObjectKind::File)
            .unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[test]
    fn test_write_then_read() {
        let (tree, _temp) = setup();
        let id = tree
            .create(tree.root_id(), &name("f"), ObjectKind::File)
            .unwrap();

        for len in [0, 1, MAX_DATA_LEN] {
            let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            tree.write(id, &DataBlock::new(bytes.clone()).unwrap()).unwrap();
            assert_eq!(tree.read(id).unwrap().as_slice(), &bytes[..]);
        }
        assert_eq!(tree.live_handles(), 1);
    }

    #[test]
    fn test_shorter_write_truncates() {
        let (tree, temp) = setup();
        std::fs::write(temp.path().join("f"), b"a long first version").unwrap();
        let id = ino(&temp.path().join("f"));

        tree.write(id, &DataBlock::new(b"short".to_vec()).unwrap())
            .unwrap();
        assert_eq!(std::fs::read(temp.path().join("f")).unwrap(), b"short");
    }

    #[test]
    fn test_read_large_file_returns_first_block() {
        let (tree, temp) = setup();
        let bytes: Vec<u8> = (0..MAX_DATA_LEN * 2).map(|i| (i % 7) as u8).collect();
        std::fs::write(temp.path().join("big"), &bytes).unwrap();

        let data = tree.read(ino(&temp.path().join("big"))).unwrap();
        assert_eq!(data.as_slice(), &bytes[..MAX_DATA_LEN]);
    }

    #[test]
    fn test_read_directory_fails() {
        let (tree, temp) = setup();
        std::fs::create_dir(temp.path().join("d")).unwrap();
        let err = tree.read(ino(&temp.path().join("d"))).unwrap_err();
        assert!(matches!(err, FsError::Operation { op: "read", .. }));
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[test]
    fn test_read_and_write_refuse_fifo() {
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
        let id = ino(&fifo);

        let err = tree.read(id).unwrap_err();
        assert!(matches!(err, FsError::Operation { op: "read", .. }));
        let err = tree
            .write(id, &DataBlock::new(b"x".to_vec()).unwrap())
            .unwrap_err();
        assert!(matches!(err, FsError::Operation { op: "write", .. }));
        assert_eq!(tree.live_handles(), 1);
    }

    #[test]
    fn test_lookup() {
        let (tree, temp) = setup();
        std::fs::create_dir(temp.path().join("d")).unwrap();
        std::fs::write(temp.path().join("d/f"), b"").unwrap();
        let dir = ino(&temp.path().join("d"));

        let found = tree.lookup(tree.root_id(), &name("d")).unwrap();
        assert_eq!(found, Descriptor::directory(dir));

        let found = tree.lookup(dir, &name("f")).unwrap();
        assert_eq!(found, Descriptor::file(ino(&temp.path().join("d/f"))));

        let err = tree.lookup(dir, &name("missing")).unwrap_err();
        assert!(matches!(err, FsError::Operation { op: "lookup", .. }));
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[test]
    fn test_list() {
        let (tree, temp) = setup();
        std::fs::create_dir(temp.path().join("d")).unwrap();
        std::fs::write(temp.path().join("f"), b"").unwrap();

        let mut entries = tree.list(tree.root_id()).unwrap();
        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name.as_bytes(), b"d");
        assert_eq!(entries[0].object, Descriptor::directory(ino(&temp.path().join("d"))));
        assert_eq!(entries[1].name.as_bytes(), b"f");
        assert_eq!(entries[1].object, Descriptor::file(ino(&temp.path().join("f"))));
    }

    #[test]
    fn test_list_capacity() {
        let (tree, temp) = setup();
        let full = temp.path().join("full");
        std::fs::create_dir(&full).unwrap();
        for i in 0..MAX_LIST_ENTRIES {
            std::fs::write(full.join(format!("e{i}")), b"").unwrap();
        }
        assert_eq!(tree.list(ino(&full)).unwrap().len(), MAX_LIST_ENTRIES);

        std::fs::write(full.join("one-more"), b"").unwrap();
        let err = tree.list(ino(&full)).unwrap_err();
        assert!(matches!(err, FsError::TooManyEntries));
        assert_eq!(tree.live_handles(), 1);
    }

    #[test]
    fn test_list_file_fails() {
        let (tree, temp) = setup();
        std::fs::write(temp.path().join("f"), b"").unwrap();
        assert!(tree.list(ino(&temp.path().join("f"))).is_err());
    }

    #[test]
    fn test_unlink() {
        let (tree, temp) = setup();
        std::fs::write(temp.path().join("f"), b"").unwrap();
        std::fs::create_dir(temp.path().join("d")).unwrap();

        tree.unlink(tree.root_id(), &name("f")).unwrap();
        assert!(!temp.path().join("f").exists());

        assert!(tree.unlink(tree.root_id(), &name("d")).is_err());
        assert!(tree.unlink(tree.root_id(), &name("f")).is_err());
    }

    #[test]
    fn test_remove_directory() {
        let (tree, temp) = setup();
        std::fs::create_dir(temp.path().join("empty")).unwrap();
        std::fs::create_dir(temp.path().join("full")).unwrap();
        std::fs::write(temp.path().join("full/f"), b"").unwrap();

        tree.remove_directory(tree.root_id(), &name("empty")).unwrap();
        assert!(!temp.path().join("empty").exists());

        let err = tree
            .remove_directory(tree.root_id(), &name("full"))
            .unwrap_err();
        assert!(matches!(err, FsError::Operation { op: "remove_directory", .. }));
        assert!(temp.path().join("full/f").exists());
    }

    #[test]
    fn test_link_shares_identity() {
        let (tree, temp) = setup();
        std::fs::create_dir(temp.path().join("d")).unwrap();
        std::fs::write(temp.path().join("src"), b"shared").unwrap();
        let src = ino(&temp.path().join("src"));

        tree.link(ino(&temp.path().join("d")), src, &name("alias"))
            .unwrap();
        assert_eq!(ino(&temp.path().join("d/alias")), src);
        assert_eq!(std::fs::read(temp.path().join("d/alias")).unwrap(), b"shared");
        assert_eq!(tree.live_handles(), 1);
    }

    #[test]
    fn test_link_root_fails() {
        let (tree, _temp) = setup();
        let root = tree.root_id();
        let err = tree.link(root, root, &name("again")).unwrap_err();
        assert!(matches!(err, FsError::Operation { op: "link", .. }));
    }

    #[test]
    fn test_mount_reports_real_root() {
        let (tree, temp) = setup();
        assert_eq!(
            tree.mount().unwrap(),
            Descriptor::directory(ino(temp.path()))
        );
        assert_eq!(ObjectOps::live_handles(&tree), Some(1));
    }
}
