//! Recursive file watcher over the project root and linked roots.
//!
//! Raw `notify` events are classified on the watcher thread by stat-ing the
//! path, filtered through the owning root's ignore rules and forwarded into a
//! tokio channel for the session loop.
//!
//! Directory-level events are expanded into per-file events: a directory
//! that appears is walked, and a path that vanishes takes every file known
//! under it along. The known set is seeded by walking each root whenever the
//! scopes change.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use linkwatch_fs::{walk_files, IgnoreRules};
use notify::event::ModifyKind;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Add,
    Change,
    Unlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
    /// Size at the time of the event; 0 for unlinks.
    pub size: u64,
}

/// Ignore scopes plus every file currently known to exist under them.
#[derive(Debug, Default)]
pub struct WatchState {
    scopes: Vec<IgnoreRules>,
    known: BTreeSet<PathBuf>,
}

impl WatchState {
    /// Scopes with their file sets walked from disk.
    pub fn seeded(scopes: Vec<IgnoreRules>) -> Self {
        let mut known = BTreeSet::new();
        for rules in &scopes {
            known.extend(files_under(rules.root(), rules));
        }
        Self { scopes, known }
    }

    pub fn is_known(&self, path: &Path) -> bool {
        self.known.contains(path)
    }

    pub fn known_len(&self) -> usize {
        self.known.len()
    }
}

type SharedState = Arc<Mutex<WatchState>>;

/// Keeps the watcher alive; dropping it stops all watches.
pub struct WatcherHandle {
    watcher: RecommendedWatcher,
    state: SharedState,
    roots: Vec<PathBuf>,
}

/// Watch every scope's root recursively.
///
/// Returns once all roots are registered; any registration failure (missing
/// root, inotify limit) is returned as-is.
pub fn start(
    scopes: Vec<IgnoreRules>,
) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<WatchEvent>), SessionError> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<WatchEvent>();
    let shared: SharedState = Arc::new(Mutex::new(WatchState::default()));
    let filter = shared.clone();

    let watcher = recommended_watcher(move |event: notify::Result<Event>| match event {
        Ok(event) => {
            let Ok(mut state) = filter.lock() else {
                return;
            };
            for observed in classify(&event, &mut state) {
                let _ = event_tx.send(observed);
            }
        }
        Err(err) => tracing::warn!(error = %err, "watcher event error"),
    })?;

    let mut handle = WatcherHandle {
        watcher,
        state: shared,
        roots: Vec::new(),
    };
    handle.set_scopes(scopes)?;
    Ok((handle, event_rx))
}

impl WatcherHandle {
    /// Re-target the watcher: unwatch roots that are gone, watch new ones,
    /// then swap in the new filters and re-seed the known files.
    pub fn set_scopes(&mut self, scopes: Vec<IgnoreRules>) -> Result<(), SessionError> {
        let next: Vec<PathBuf> = scopes.iter().map(|s| s.root().to_path_buf()).collect();

        for root in self.roots.iter().filter(|r| !next.contains(r)) {
            if let Err(err) = self.watcher.unwatch(root) {
                tracing::debug!(path = %root.display(), error = %err, "unwatch failed");
            }
        }
        for root in next.iter().filter(|r| !self.roots.contains(r)) {
            self.watcher.watch(root, RecursiveMode::Recursive)?;
            tracing::debug!(path = %root.display(), "watching");
        }

        let seeded = WatchState::seeded(scopes);
        tracing::debug!(files = seeded.known_len(), "known files seeded");
        if let Ok(mut guard) = self.state.lock() {
            *guard = seeded;
        }
        self.roots = next;
        Ok(())
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Turn one raw event into zero or more [`WatchEvent`]s, keeping `state`'s
/// known files in step.
///
/// The event kind is only a hint; the filesystem decides. A path that no
/// longer exists unlinks every known file at or below it, an existing file
/// reported as removed is a change, and a directory that was created or
/// moved in is reported file by file.
pub fn classify(event: &Event, state: &mut WatchState) -> Vec<WatchEvent> {
    let hint = match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)) => WatchEventKind::Add,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => WatchEventKind::Change,
        EventKind::Remove(_) => WatchEventKind::Unlink,
        _ => return Vec::new(),
    };

    let WatchState { scopes, known } = state;
    let mut observed = Vec::new();
    for path in &event.paths {
        let Some(rules) = owning_scope(path, scopes.as_slice()) else {
            continue;
        };
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {
                if hint == WatchEventKind::Add && !rules.is_ignored(path, true) {
                    observed.extend(appeared_dir(path, rules, known));
                }
            }
            Ok(meta) => {
                if rules.is_ignored(path, false) {
                    continue;
                }
                let kind = match hint {
                    WatchEventKind::Unlink => WatchEventKind::Change,
                    other => other,
                };
                known.insert(path.clone());
                observed.push(WatchEvent {
                    kind,
                    path: path.clone(),
                    size: meta.len(),
                });
            }
            Err(_) => {
                if rules.is_ignored(path, false) {
                    continue;
                }
                observed.extend(vanished(path, known));
            }
        }
    }
    observed
}

/// Every file below a directory that just appeared, as adds.
fn appeared_dir(
    dir: &Path,
    rules: &IgnoreRules,
    known: &mut BTreeSet<PathBuf>,
) -> Vec<WatchEvent> {
    files_under(dir, rules)
        .into_iter()
        .filter_map(|path| {
            let size = fs::metadata(&path).ok()?.len();
            known.insert(path.clone());
            Some(WatchEvent {
                kind: WatchEventKind::Add,
                path,
                size,
            })
        })
        .collect()
}

/// Unlinks for `path` and every known file below it. A path nothing was
/// known about (a directory whose files already went, a file that never
/// lived long enough to be seen) yields nothing.
fn vanished(path: &Path, known: &mut BTreeSet<PathBuf>) -> Vec<WatchEvent> {
    let gone: Vec<PathBuf> = known
        .range(path.to_path_buf()..)
        .take_while(|candidate| candidate.starts_with(path))
        .cloned()
        .collect();
    gone.into_iter()
        .map(|file| {
            known.remove(&file);
            WatchEvent {
                kind: WatchEventKind::Unlink,
                path: file,
                size: 0,
            }
        })
        .collect()
}

fn files_under(dir: &Path, rules: &IgnoreRules) -> Vec<PathBuf> {
    match walk_files(dir, rules) {
        Ok(files) => files,
        Err(err) => {
            tracing::debug!(path = %dir.display(), error = %err, "could not walk directory");
            Vec::new()
        }
    }
}

/// The scope whose root is the deepest prefix of `path`.
fn owning_scope<'a>(path: &Path, scopes: &'a [IgnoreRules]) -> Option<&'a IgnoreRules> {
    scopes
        .iter()
        .filter(|rules| path.starts_with(rules.root()))
        .max_by_key(|rules| rules.root().components().count())
}
