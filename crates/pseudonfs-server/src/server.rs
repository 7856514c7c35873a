//! TCP export server.
//!
//! Connections are served one at a time, in accept order. Each connection
//! carries any number of fixed-size request frames; each gets exactly one
//! fixed-size response frame before the next is read.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use pseudonfs_engine::{Dispatcher, FsError, ServedTree};
use pseudonfs_types::REQUEST_SIZE;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::constants::ACCEPT_BACKOFF;

/// Startup failures. Once running, the server only logs.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot open served tree: {0}")]
    Engine(#[from] FsError),
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// A bound, ready-to-run export server.
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    /// Open the served tree and bind the listener.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let tree = ServedTree::open(&config.root)?;
        let dispatcher = Arc::new(Dispatcher::new(tree)?);
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        info!(
            root = %config.root.display(),
            real_root = %dispatcher.ops().root_id(),
            "serving tree"
        );
        Ok(Self {
            listener,
            dispatcher,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Serve forever.
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Serve until `shutdown` completes. A connection in progress is dropped
    /// at its next await point.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        tokio::select! {
            _ = self.accept_loop() => {}
            _ = &mut shutdown => info!("shutting down"),
        }
    }

    async fn accept_loop(&self) {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            info!(%peer, "connection opened");
            match serve_connection(stream, Arc::clone(&self.dispatcher)).await {
                Ok(served) => info!(%peer, served, "connection closed"),
                Err(e) => warn!(%peer, error = %e, "connection torn down"),
            }
        }
    }
}

/// Serve request frames on `stream` until the peer closes it.
///
/// Returns how many requests were answered. A peer that closes between
/// frames or partway through one ends the connection cleanly.
pub async fn serve_connection(
    mut stream: TcpStream,
    dispatcher: Arc<Dispatcher>,
) -> io::Result<u64> {
    let mut served = 0;
    loop {
        let mut frame = vec![0u8; REQUEST_SIZE];
        match stream.read_exact(&mut frame).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(served),
            Err(e) => return Err(e),
        }
        debug!(tag = frame[0], "request");

        let dispatcher = Arc::clone(&dispatcher);
        let response = tokio::task::spawn_blocking(move || dispatcher.handle_frame(&frame))
            .await
            .map_err(io::Error::other)?;
        stream.write_all(&response).await?;
        served += 1;
    }
}
