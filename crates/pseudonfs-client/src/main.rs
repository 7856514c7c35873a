//! pnfs: command-line access to a pseudonfs export.
//!
//! Usage:
//!   pnfs ls /docs
//!   pnfs --server 10.0.0.5:7049 cat /docs/notes.txt
//!   echo hello | pnfs put /docs/hello.txt
//!   pnfs --json stat /docs

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pseudonfs_client::Session;
use pseudonfs_client::constants::DEFAULT_HOST;
use pseudonfs_types::{DEFAULT_PORT, MAX_DATA_LEN, ObjectKind};
use tracing_subscriber::{EnvFilter, fmt};

/// Command-line client for a pseudonfs export.
#[derive(Parser, Debug)]
#[command(name = "pnfs")]
#[command(about = "Browse and edit a pseudonfs export")]
struct Args {
    /// Server address as host:port
    #[arg(short, long, default_value_t = format!("{DEFAULT_HOST}:{DEFAULT_PORT}"))]
    server: String,

    /// Print listings and descriptors as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print a file (first block only)
    Cat { path: String },
    /// Replace a file's contents from stdin or a local file
    Put {
        path: String,
        /// Read contents from this local file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Create an empty file
    Touch { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Remove a file
    Rm { path: String },
    /// Remove an empty directory
    Rmdir { path: String },
    /// Add a hard link at TARGET to SOURCE
    Ln { source: String, target: String },
    /// Show an object's identifier and kind
    Stat { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let session = Session::mount(&args.server)
        .await
        .with_context(|| format!("mounting {}", args.server))?;

    match args.command {
        Command::Ls { path } => {
            let dir = session.walk(&path).await?;
            let mut entries = session.list(dir.id).await?;
            entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
            if args.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    let marker = match entry.object.kind {
                        ObjectKind::Directory => 'd',
                        ObjectKind::File => '-',
                    };
                    println!("{marker} {:>12} {}", entry.object.id.get(), entry.name);
                }
            }
        }
        Command::Cat { path } => {
            let file = session.walk(&path).await?;
            let data = session.read(file.id).await?;
            std::io::stdout().write_all(data.as_slice())?;
        }
        Command::Put { path, file } => {
            let bytes = match file {
                Some(local) => std::fs::read(&local)
                    .with_context(|| format!("reading {}", local.display()))?,
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            if bytes.len() > MAX_DATA_LEN {
                bail!("{} bytes is more than one block ({MAX_DATA_LEN})", bytes.len());
            }
            let id = match session.walk(&path).await {
                Ok(found) => found.id,
                Err(e) if e.is_rejected() => {
                    let (parent, name) = session.walk_parent(&path).await?;
                    session.create(parent, &name, ObjectKind::File).await?
                }
                Err(e) => return Err(e.into()),
            };
            session.write(id, &bytes).await?;
        }
        Command::Touch { path } => {
            let (parent, name) = session.walk_parent(&path).await?;
            session.create(parent, &name, ObjectKind::File).await?;
        }
        Command::Mkdir { path } => {
            let (parent, name) = session.walk_parent(&path).await?;
            session.create(parent, &name, ObjectKind::Directory).await?;
        }
        Command::Rm { path } => {
            let (parent, name) = session.walk_parent(&path).await?;
            session.unlink(parent, &name).await?;
        }
        Command::Rmdir { path } => {
            let (parent, name) = session.walk_parent(&path).await?;
            session.remove_directory(parent, &name).await?;
        }
        Command::Ln { source, target } => {
            let source = session.walk(&source).await?;
            let (parent, name) = session.walk_parent(&target).await?;
            session.link(parent, source.id, &name).await?;
        }
        Command::Stat { path } => {
            let object = session.walk(&path).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&object)?);
            } else {
                println!("{} {}", object.id, object.kind);
            }
        }
    }
    Ok(())
}
