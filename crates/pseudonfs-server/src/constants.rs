//! Server configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

pub use pseudonfs_types::DEFAULT_PORT;

/// Default bind address (localhost only; the protocol has no authentication).
pub const DEFAULT_BIND_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Pause after a failed accept before trying again.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);
