//! Client configuration constants.

use std::time::Duration;

/// Default server host for the command-line tool.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Time allowed to establish the connection for one call.
///
/// Only the connect is bounded. Once connected, a call waits as long as the
/// server takes, since a slow search on a large tree is not a failure.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
