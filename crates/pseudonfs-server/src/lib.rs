//! pseudonfs export server library
//!
//! Binds a TCP listener and feeds request frames to a
//! [`pseudonfs_engine::Dispatcher`] over one served tree.

pub mod config;
pub mod constants;
pub mod server;

pub use config::{ConfigError, ConfigFile, ServerConfig};
pub use server::{Server, ServerError, serve_connection};
