//! Server configuration.
//!
//! Settings come from an optional RON file with command-line flags layered
//! on top. Every field may be omitted:
//!
//! ```ron
//! (
//!     root: "~/export",
//!     port: 7049,
//!     bind: "0.0.0.0",
//! )
//! ```

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use ron::extensions::Extensions;
use serde::Deserialize;
use thiserror::Error;

use crate::constants::{DEFAULT_BIND_ADDRESS, DEFAULT_PORT};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("no root directory given")]
    MissingRoot,
    #[error("cannot serve {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
}

/// One layer of settings, from a file or from flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub root: Option<PathBuf>,
    pub port: Option<u16>,
    pub bind: Option<IpAddr>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse RON text. Optional fields are written bare, without `Some(..)`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let options = ron::Options::default().with_default_extension(Extensions::IMPLICIT_SOME);
        Ok(options.from_str(text)?)
    }

    /// Fields set in `top` win over fields set in `self`.
    pub fn overlay(self, top: ConfigFile) -> ConfigFile {
        ConfigFile {
            root: top.root.or(self.root),
            port: top.port.or(self.port),
            bind: top.bind.or(self.bind),
        }
    }
}

/// Resolved server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Canonical path of the exported directory.
    pub root: PathBuf,
    pub bind_addr: SocketAddr,
}

impl ServerConfig {
    pub fn new(root: impl AsRef<Path>, bind_addr: SocketAddr) -> Result<Self, ConfigError> {
        Ok(Self {
            root: expand_root(root.as_ref())?,
            bind_addr,
        })
    }

    /// Merge a file layer and a flag layer, then fill in defaults.
    pub fn from_layers(file: ConfigFile, flags: ConfigFile) -> Result<Self, ConfigError> {
        let merged = file.overlay(flags);
        let root = merged.root.ok_or(ConfigError::MissingRoot)?;
        let bind_addr = SocketAddr::new(
            merged.bind.unwrap_or(DEFAULT_BIND_ADDRESS),
            merged.port.unwrap_or(DEFAULT_PORT),
        );
        Self::new(root, bind_addr)
    }
}

/// Expand `~` and canonicalize, requiring an existing directory.
pub fn expand_root(raw: &Path) -> Result<PathBuf, ConfigError> {
    let expanded = match raw.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => raw.to_path_buf(),
    };
    let root = dunce::canonicalize(&expanded).map_err(|source| ConfigError::Root {
        path: expanded.clone(),
        source,
    })?;
    if !root.is_dir() {
        return Err(ConfigError::NotADirectory(root));
    }
    Ok(root)
}
