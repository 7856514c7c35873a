//! A mounted export.
//!
//! Every call opens its own TCP connection, sends exactly one request frame,
//! reads exactly one response frame and closes. No state is kept on the
//! server between calls.

use std::net::SocketAddr;

use pseudonfs_types::{
    DataBlock, Descriptor, DirEntry, Name, ObjectId, ObjectKind, RESPONSE_SIZE, Reply, Request,
    Response,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::constants::CONNECT_TIMEOUT;
use crate::error::{ClientError, ClientResult};
use crate::path;

/// Client handle to one export.
#[derive(Debug, Clone)]
pub struct Session {
    addr: SocketAddr,
    root: Descriptor,
}

impl Session {
    /// Resolve `addr`, send Mount and remember the root the server reports.
    pub async fn mount(addr: &str) -> ClientResult<Self> {
        let addr = lookup_host(addr)
            .await?
            .next()
            .ok_or_else(|| ClientError::protocol(format!("{addr} resolved to no address")))?;
        let root = match exchange(addr, &Request::Mount).await? {
            Reply::Mount { root } => root,
            other => return Err(unexpected(&other)),
        };
        debug!(%addr, root = %root.id, "mounted");
        Ok(Self { addr, root })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The root as the server presents it (the sentinel identifier).
    pub fn root(&self) -> Descriptor {
        self.root
    }

    /// Send one request and return the successful reply.
    pub async fn call(&self, request: &Request) -> ClientResult<Reply> {
        exchange(self.addr, request).await
    }

    // ========================================================================
    // Operations
    // ========================================================================

    pub async fn create(
        &self,
        parent: ObjectId,
        name: &Name,
        kind: ObjectKind,
    ) -> ClientResult<ObjectId> {
        let request = Request::Create {
            parent,
            name: name.clone(),
            kind,
        };
        match self.call(&request).await? {
            Reply::Create { id } => Ok(id),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn link(&self, parent: ObjectId, source: ObjectId, name: &Name) -> ClientResult<()> {
        let request = Request::Link {
            parent,
            source,
            name: name.clone(),
        };
        match self.call(&request).await? {
            Reply::Link => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn unlink(&self, parent: ObjectId, name: &Name) -> ClientResult<()> {
        let request = Request::Unlink {
            parent,
            name: name.clone(),
        };
        match self.call(&request).await? {
            Reply::Unlink => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn read(&self, id: ObjectId) -> ClientResult<DataBlock> {
        match self.call(&Request::Read { id }).await? {
            Reply::Read { data } => Ok(data),
            other => Err(unexpected(&other)),
        }
    }

    /// Replace a file's contents. More than one data block is refused before
    /// anything is sent.
    pub async fn write(&self, id: ObjectId, data: &[u8]) -> ClientResult<()> {
        let data = DataBlock::new(data)?;
        match self.call(&Request::Write { id, data }).await? {
            Reply::Write => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn list(&self, id: ObjectId) -> ClientResult<Vec<DirEntry>> {
        match self.call(&Request::List { id }).await? {
            Reply::List { entries } => Ok(entries),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn remove_directory(&self, parent: ObjectId, name: &Name) -> ClientResult<()> {
        let request = Request::RemoveDirectory {
            parent,
            name: name.clone(),
        };
        match self.call(&request).await? {
            Reply::RemoveDirectory => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn lookup(&self, parent: ObjectId, name: &Name) -> ClientResult<Descriptor> {
        let request = Request::Lookup {
            parent,
            name: name.clone(),
        };
        match self.call(&request).await? {
            Reply::Lookup { object } => Ok(object),
            other => Err(unexpected(&other)),
        }
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// Look up each component of `path` starting at the root.
    pub async fn walk(&self, path: &str) -> ClientResult<Descriptor> {
        let mut current = self.root;
        for name in path::components(path)? {
            if !current.kind.is_dir() {
                return Err(ClientError::path(path));
            }
            current = self.lookup(current.id, &name).await?;
        }
        Ok(current)
    }

    /// Walk to the directory containing `path` and return it with the final
    /// name.
    pub async fn walk_parent(&self, path: &str) -> ClientResult<(ObjectId, Name)> {
        let (parents, name) = path::split_parent(path)?;
        let mut current = self.root;
        for part in parents {
            current = self.lookup(current.id, &part).await?;
        }
        if !current.kind.is_dir() {
            return Err(ClientError::path(path));
        }
        Ok((current.id, name))
    }
}

async fn exchange(addr: SocketAddr, request: &Request) -> ClientResult<Reply> {
    let op = request.op();
    let mut stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| ClientError::Timeout(addr))??;
    stream.write_all(&request.encode()).await?;

    let mut frame = vec![0u8; RESPONSE_SIZE];
    if let Err(e) = stream.read_exact(&mut frame).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(ClientError::protocol(format!(
                "connection closed before {op} response"
            )));
        }
        return Err(e.into());
    }
    trace!(%op, "response received");

    let response = Response::decode(&frame)?;
    if response.op() != op {
        return Err(ClientError::protocol(format!(
            "sent {op}, server answered {}",
            response.op()
        )));
    }
    match response {
        Response::Ok(reply) => Ok(reply),
        Response::Err(op) => Err(ClientError::Rejected { op }),
    }
}

fn unexpected(reply: &Reply) -> ClientError {
    ClientError::protocol(format!("unexpected {} reply", reply.op()))
}
