//! Pending local changes between two flushes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use linkwatch_core::{Change, LinkConfig};
use linkwatch_fs::content::read_base64_if_exists;
use linkwatch_fs::to_builder_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Update,
    Delete,
}

impl ChangeKind {
    /// One-letter tag used in the change log line.
    pub fn tag(self) -> char {
        match self {
            ChangeKind::Update => 'U',
            ChangeKind::Delete => 'D',
        }
    }
}

/// A queued change; content is read only when the batch is flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Coalescing queue keyed by local path.
///
/// A later change to a queued path replaces its kind in place, so a batch
/// holds at most one entry per path, ordered by first insertion.
#[derive(Debug, Default)]
pub struct ChangeQueue {
    entries: Vec<PendingChange>,
    index: HashMap<PathBuf, usize>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, path: PathBuf, kind: ChangeKind) {
        match self.index.get(&path) {
            Some(&slot) => self.entries[slot].kind = kind,
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push(PendingChange { path, kind });
            }
        }
    }

    /// Take the whole batch, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<PendingChange> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turn a drained batch into wire changes.
///
/// Paths are remapped with `link_config`; updates read the file as it is now.
/// A file that vanished since its event, or that can no longer be read, is
/// skipped with a warning. Paths outside every watched tree are dropped.
pub fn materialize(
    pending: &[PendingChange],
    project_root: &Path,
    link_config: &LinkConfig,
) -> Vec<Change> {
    let mut changes = Vec::with_capacity(pending.len());
    for entry in pending {
        let Some(remote) = to_builder_path(&entry.path, project_root, link_config) else {
            tracing::debug!(path = %entry.path.display(), "change outside watched trees");
            continue;
        };
        match entry.kind {
            ChangeKind::Delete => changes.push(Change::delete(remote)),
            ChangeKind::Update => match read_base64_if_exists(&entry.path) {
                Ok(Some(content)) => changes.push(Change::update(remote, content)),
                Ok(None) => {
                    tracing::warn!(path = %entry.path.display(), "changed file vanished before upload");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable file");
                }
            },
        }
    }
    changes
}
