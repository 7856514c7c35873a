//! Request dispatch.
//!
//! One frame in, one frame out. Decoding, root translation, routing and
//! encoding all happen here, so the connection layer only moves bytes.

use bytes::Bytes;
use pseudonfs_types::{OpKind, Reply, Request, Response, rejection};
use tracing::{debug, error, warn};

use crate::error::{ErrorClass, FsError, FsResult};
use crate::ops::ObjectOps;
use crate::translate::RootTranslator;
use crate::tree::ServedTree;

/// Routes decoded requests to an [`ObjectOps`] implementation.
#[derive(Debug)]
pub struct Dispatcher<O = ServedTree> {
    ops: O,
    translator: RootTranslator,
    baseline: Option<usize>,
}

impl<O: ObjectOps> Dispatcher<O> {
    /// Wrap `ops`, learning the real root from its mount descriptor.
    pub fn new(ops: O) -> FsResult<Self> {
        let root = ops.mount()?;
        let baseline = ops.live_handles();
        Ok(Self {
            ops,
            translator: RootTranslator::new(root.id),
            baseline,
        })
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Handle one raw request frame and produce the response frame.
    ///
    /// Frames that do not decode get an Err response echoing their first
    /// byte.
    pub fn handle_frame(&self, frame: &[u8]) -> Bytes {
        let request = match Request::decode(frame) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "rejecting undecodable request");
                return rejection(frame.first().copied().unwrap_or(0));
            }
        };
        let op = request.op();
        match self.handle(request).encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!(%op, error = %e, "reply does not fit the wire");
                rejection(op.tag())
            }
        }
    }

    /// Handle one decoded request.
    pub fn handle(&self, request: Request) -> Response {
        let op = request.op();
        let response = match self.execute(request) {
            Ok(reply) => Response::Ok(reply),
            Err(e) => {
                log_failure(op, &e);
                Response::Err(op)
            }
        };
        self.check_handles();
        response
    }

    fn execute(&self, request: Request) -> FsResult<Reply> {
        let request = self.translator.inbound(request)?;
        let reply = route(&self.ops, request)?;
        self.translator.outbound(reply)
    }

    fn check_handles(&self) {
        if let (Some(baseline), Some(live)) = (self.baseline, self.ops.live_handles()) {
            if live != baseline {
                warn!(baseline, live, "traversal handles leaked");
            }
        }
    }
}

fn log_failure(op: OpKind, err: &FsError) {
    match err.class() {
        ErrorClass::NotFound => debug!(%op, error = %err, "request failed"),
        ErrorClass::Operation => debug!(%op, error = %err, "request failed"),
        ErrorClass::Capacity => warn!(%op, error = %err, "request exceeds wire limits"),
    }
}

/// Call the operation named by `request` and wrap its result as a reply.
pub fn route<O: ObjectOps + ?Sized>(ops: &O, request: Request) -> FsResult<Reply> {
    Ok(match request {
        Request::Create { parent, name, kind } => Reply::Create {
            id: ops.create(parent, &name, kind)?,
        },
        Request::Link {
            parent,
            source,
            name,
        } => {
            ops.link(parent, source, &name)?;
            Reply::Link
        }
        Request::Unlink { parent, name } => {
            ops.unlink(parent, &name)?;
            Reply::Unlink
        }
        Request::Read { id } => Reply::Read {
            data: ops.read(id)?,
        },
        Request::Write { id, data } => {
            ops.write(id, &data)?;
            Reply::Write
        }
        Request::List { id } => Reply::List {
            entries: ops.list(id)?,
        },
        Request::RemoveDirectory { parent, name } => {
            ops.remove_directory(parent, &name)?;
            Reply::RemoveDirectory
        }
        Request::Lookup { parent, name } => Reply::Lookup {
            object: ops.lookup(parent, &name)?,
        },
        Request::Mount => Reply::Mount { root: ops.mount()? },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;
    use std::sync::Mutex;

    use pseudonfs_types::{
        DataBlock, Descriptor, DirEntry, Name, ObjectId, ObjectKind, REQUEST_SIZE, RESPONSE_SIZE,
        ROOT_SENTINEL,
    };
    use tempfile::TempDir;

    const REAL_ROOT: ObjectId = ObjectId::new(500);

    /// Records the identifiers each call receives.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<ObjectId>>,
    }

    impl Recorder {
        fn note(&self, ids: &[ObjectId]) {
            self.seen.lock().unwrap().extend_from_slice(ids);
        }

        fn seen(&self) -> Vec<ObjectId> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl ObjectOps for Recorder {
        fn create(&self, parent: ObjectId, _: &Name, _: ObjectKind) -> FsResult<ObjectId> {
            self.note(&[parent]);
            Ok(ObjectId::new(77))
        }
        fn link(&self, parent: ObjectId, source: ObjectId, _: &Name) -> FsResult<()> {
            self.note(&[parent, source]);
            Ok(())
        }
        fn unlink(&self, parent: ObjectId, _: &Name) -> FsResult<()> {
            self.note(&[parent]);
            Ok(())
        }
        fn remove_directory(&self, parent: ObjectId, _: &Name) -> FsResult<()> {
            self.note(&[parent]);
            Ok(())
        }
        fn lookup(&self, parent: ObjectId, _: &Name) -> FsResult<Descriptor> {
            self.note(&[parent]);
            Ok(Descriptor::directory(REAL_ROOT))
        }
        fn read(&self, id: ObjectId) -> FsResult<DataBlock> {
            self.note(&[id]);
            Ok(DataBlock::empty())
        }
        fn write(&self, id: ObjectId, _: &DataBlock) -> FsResult<()> {
            self.note(&[id]);
            Ok(())
        }
        fn list(&self, id: ObjectId) -> FsResult<Vec<DirEntry>> {
            self.note(&[id]);
            Ok(vec![DirEntry::new(
                Name::try_from("collide").unwrap(),
                Descriptor::file(ROOT_SENTINEL),
            )])
        }
        fn mount(&self) -> FsResult<Descriptor> {
            Ok(Descriptor::directory(REAL_ROOT))
        }
    }

    fn name(s: &str) -> Name {
        Name::try_from(s).unwrap()
    }

    #[test]
    fn test_sentinel_is_translated_for_every_op() {
        let dispatcher = Dispatcher::new(Recorder::default()).unwrap();
        let requests = vec![
            Request::Create {
                parent: ROOT_SENTINEL,
                name: name("a"),
                kind: ObjectKind::File,
            },
            Request::Link {
                parent: ROOT_SENTINEL,
                source: ObjectId::new(9),
                name: name("b"),
            },
            Request::Unlink {
                parent: ROOT_SENTINEL,
                name: name("a"),
            },
            Request::Read { id: ROOT_SENTINEL },
            Request::Write {
                id: ROOT_SENTINEL,
                data: DataBlock::empty(),
            },
            Request::RemoveDirectory {
                parent: ROOT_SENTINEL,
                name: name("d"),
            },
            Request::Lookup {
                parent: ROOT_SENTINEL,
                name: name("x"),
            },
        ];
        for request in requests {
            let op = request.op();
            let response = dispatcher.handle(request);
            assert_eq!(response.op(), op);
            assert!(matches!(response, Response::Ok(_)), "{op} failed");
        }
        let seen = dispatcher.ops().seen();
        assert!(!seen.contains(&ROOT_SENTINEL));
        assert_eq!(seen.iter().filter(|id| **id == REAL_ROOT).count(), 7);
    }

    #[test]
    fn test_replies_hide_real_root() {
        let dispatcher = Dispatcher::new(Recorder::default()).unwrap();
        assert_eq!(
            dispatcher.handle(Request::Mount),
            Response::Ok(Reply::Mount {
                root: Descriptor::directory(ROOT_SENTINEL)
            })
        );
        let lookup = dispatcher.handle(Request::Lookup {
            parent: ObjectId::new(3),
            name: name("up"),
        });
        assert_eq!(
            lookup,
            Response::Ok(Reply::Lookup {
                object: Descriptor::directory(ROOT_SENTINEL)
            })
        );
    }

    #[test]
    fn test_real_root_from_client_is_rejected() {
        let dispatcher = Dispatcher::new(Recorder::default()).unwrap();
        let response = dispatcher.handle(Request::Read { id: REAL_ROOT });
        assert_eq!(response, Response::Err(OpKind::Read));
        assert!(dispatcher.ops().seen().is_empty());
    }

    #[test]
    fn test_sentinel_collision_fails_request() {
        let dispatcher = Dispatcher::new(Recorder::default()).unwrap();
        let response = dispatcher.handle(Request::List { id: ObjectId::new(4) });
        assert_eq!(response, Response::Err(OpKind::List));
    }

    #[test]
    fn test_unknown_tag_is_rejected_with_echo() {
        let dispatcher = Dispatcher::new(Recorder::default()).unwrap();
        let mut frame = vec![0u8; REQUEST_SIZE];
        frame[0] = 0xee;

        let reply = dispatcher.handle_frame(&frame);
        assert_eq!(reply.len(), RESPONSE_SIZE);
        assert_eq!(reply[0], 0xee);
        assert_eq!(reply[1], 1);
        assert!(reply[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_short_frame_is_rejected() {
        let dispatcher = Dispatcher::new(Recorder::default()).unwrap();
        let reply = dispatcher.handle_frame(&[OpKind::Mount.tag(), 0, 0]);
        assert_eq!(reply.len(), RESPONSE_SIZE);
        assert_eq!(reply[..2], [OpKind::Mount.tag(), 1]);
    }

    #[test]
    fn test_mount_frame_against_real_tree() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("f"), b"hello").unwrap();
        let dispatcher = Dispatcher::new(ServedTree::open(temp.path()).unwrap()).unwrap();

        let reply = dispatcher.handle_frame(&Request::Mount.encode());
        assert_eq!(
            Response::decode(&reply).unwrap(),
            Response::Ok(Reply::Mount {
                root: Descriptor::directory(ROOT_SENTINEL)
            })
        );

        let lookup = Request::Lookup {
            parent: ROOT_SENTINEL,
            name: name("f"),
        };
        let reply = Response::decode(&dispatcher.handle_frame(&lookup.encode())).unwrap();
        let ino = std::fs::metadata(temp.path().join("f")).unwrap().ino();
        assert_eq!(
            reply,
            Response::Ok(Reply::Lookup {
                object: Descriptor::file(ObjectId::new(ino))
            })
        );

        let read = Request::Read {
            id: ObjectId::new(ino),
        };
        match Response::decode(&dispatcher.handle_frame(&read.encode())).unwrap() {
            Response::Ok(Reply::Read { data }) => assert_eq!(data.as_slice(), b"hello"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(dispatcher.ops().live_handles(), 1);
    }
}
