//! Full file set for an initial link: local tree plus linked dependencies.

use std::path::Path;

use linkwatch_core::{FileEntry, LinkConfig};

use crate::content::read_base64_if_exists;
use crate::enumerate::list_local_files;
use crate::error::FsError;
use crate::linked::linked_files;
use crate::rules::IgnoreRules;

/// Everything an initial link uploads, with contents already encoded.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub files: Vec<FileEntry>,
    /// How many of `files` came from linked dependencies.
    pub linked: usize,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }
}

/// Enumerate and read the current state of `root` and every linked dependency.
///
/// Always reads the disk afresh; nothing is cached between calls.
pub fn build_snapshot(
    root: &Path,
    rules: &IgnoreRules,
    link_config: &LinkConfig,
) -> Result<Snapshot, FsError> {
    let mut files = Vec::new();
    for relative in list_local_files(root, rules)? {
        let path = root.join(&relative);
        match read_base64_if_exists(&path)? {
            Some(content) => files.push(FileEntry {
                path: relative,
                content,
                linked: false,
            }),
            None => tracing::warn!(path = %path.display(), "file vanished before read"),
        }
    }

    let linked = linked_files(link_config)?;
    let linked_count = linked.len();
    files.extend(linked);

    Ok(Snapshot {
        files,
        linked: linked_count,
    })
}
