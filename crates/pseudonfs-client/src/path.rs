//! Slash-separated paths inside an export.
//!
//! The protocol has no path operations, only Lookup by name. These helpers
//! turn a path into the name sequence a walk from the root needs.

use pseudonfs_types::Name;

use crate::error::{ClientError, ClientResult};

/// Split `path` into validated components.
///
/// Empty components and `.` are skipped, so `/a//b/./c` is `[a, b, c]`.
/// `..` is refused: there is no parent lookup on the wire.
pub fn components(path: &str) -> ClientResult<Vec<Name>> {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .map(|part| {
            if part == ".." {
                return Err(ClientError::path(path));
            }
            Ok(Name::try_from(part)?)
        })
        .collect()
}

/// Split `path` into its parent components and final name.
///
/// The root itself has no final name and is an error.
pub fn split_parent(path: &str) -> ClientResult<(Vec<Name>, Name)> {
    let mut parts = components(path)?;
    let name = parts.pop().ok_or_else(|| ClientError::path(path))?;
    Ok((parts, name))
}
