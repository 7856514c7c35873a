//! pnfsd: pseudonfs export server binary.
//!
//! ## Usage
//!
//! ```bash
//! # Export ~/share on the default port, localhost only
//! pnfsd ~/share
//!
//! # Export /srv/data on port 9000, all interfaces
//! pnfsd /srv/data 9000 --bind 0.0.0.0
//!
//! # Settings from a RON file, flags still win
//! pnfsd --config /etc/pnfsd.ron
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use pseudonfs_server::{ConfigFile, Server, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Export a directory tree over the pseudonfs protocol.
#[derive(Parser, Debug)]
#[command(name = "pnfsd")]
#[command(about = "Export a directory tree over the pseudonfs protocol")]
struct Args {
    /// Directory to export
    root: Option<PathBuf>,

    /// TCP port to listen on
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    bind: Option<IpAddr>,

    /// RON settings file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let file = match &args.config {
        Some(path) => ConfigFile::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigFile::default(),
    };
    let flags = ConfigFile {
        root: args.root,
        port: args.port,
        bind: args.bind,
    };
    let config = ServerConfig::from_layers(file, flags)?;

    let server = Server::bind(&config).await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "cannot watch for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(())
}
