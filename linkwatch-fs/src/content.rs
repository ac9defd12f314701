//! File bodies and path spelling as the build service expects them.

use std::io::ErrorKind;
use std::path::{Component, Path};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{io_err, FsError};

/// Read `path` and encode it as standard base64.
pub fn read_base64(path: &Path) -> Result<String, FsError> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    Ok(STANDARD.encode(bytes))
}

/// Like [`read_base64`], but a file that no longer exists yields `Ok(None)`.
///
/// Files routinely disappear between being listed (or reported by the
/// watcher) and being read; callers skip those instead of failing a batch.
pub fn read_base64_if_exists(path: &Path) -> Result<Option<String>, FsError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(STANDARD.encode(bytes))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Join the normal components of a relative path with `/`, whatever the host separator.
pub fn to_slash(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
