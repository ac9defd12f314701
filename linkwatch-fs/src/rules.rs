//! Ignore rules shared by the enumerator and the watcher.
//!
//! Patterns use gitignore syntax and are compiled once with the `ignore`
//! crate. Dependency-manager directories are excluded before any pattern is
//! consulted, so no negation in a user file can bring them back.

use std::path::{Component, Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::FsError;

/// Per-project ignore file, gitignore syntax.
pub const IGNORE_FILE: &str = ".linkwatchignore";

/// Directory names that are never sent, at any depth.
pub const DEPENDENCY_DIRS: &[&str] = &["node_modules"];

/// Patterns applied to every tree before project-specific ones.
pub const DEFAULT_IGNORES: &[&str] = &[
    ".git/",
    ".DS_Store",
    "*.swp",
    "*.orig",
    "*~",
    ".linked_deps/",
    ".linkwatch.yaml",
    ".linkwatch.yaml.tmp",
    IGNORE_FILE,
];

/// Compiled ignore matcher rooted at one directory.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    root: PathBuf,
    matcher: Gitignore,
}

impl IgnoreRules {
    /// Rules for a project root: defaults, then `.linkwatchignore`, then `extra`.
    pub fn for_project(root: &Path, extra: &[String]) -> Result<Self, FsError> {
        let mut builder = GitignoreBuilder::new(root);
        add_patterns(&mut builder, DEFAULT_IGNORES.iter().copied())?;

        let ignore_file = root.join(IGNORE_FILE);
        if ignore_file.is_file() {
            if let Some(err) = builder.add(&ignore_file) {
                return Err(FsError::Pattern {
                    pattern: ignore_file.display().to_string(),
                    source: err,
                });
            }
        }

        add_patterns(&mut builder, extra.iter().map(String::as_str))?;
        Self::build(root, builder)
    }

    /// Rules for an arbitrary tree (a linked dependency): defaults plus `patterns`.
    pub fn with_patterns(root: &Path, patterns: &[String]) -> Result<Self, FsError> {
        let mut builder = GitignoreBuilder::new(root);
        add_patterns(&mut builder, DEFAULT_IGNORES.iter().copied())?;
        add_patterns(&mut builder, patterns.iter().map(String::as_str))?;
        Self::build(root, builder)
    }

    fn build(root: &Path, builder: GitignoreBuilder) -> Result<Self, FsError> {
        let matcher = builder.build().map_err(|e| FsError::Pattern {
            pattern: "<combined>".to_string(),
            source: e,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
            matcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` (absolute under the root, or root-relative) is excluded.
    ///
    /// Absolute paths outside the root are never ignored by these rules.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let relative = match path.strip_prefix(&self.root) {
            Ok(rel) => rel,
            Err(_) if path.is_relative() => path,
            Err(_) => return false,
        };
        if relative.as_os_str().is_empty() {
            return false;
        }
        if in_dependency_dir(relative) {
            return true;
        }
        self.matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}

/// Whether any component of `path` is a dependency-manager directory.
pub fn in_dependency_dir(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name
            .to_str()
            .is_some_and(|name| DEPENDENCY_DIRS.contains(&name)),
        _ => false,
    })
}

fn add_patterns<'a>(
    builder: &mut GitignoreBuilder,
    patterns: impl Iterator<Item = &'a str>,
) -> Result<(), FsError> {
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| FsError::Pattern {
                pattern: pattern.to_string(),
                source: e,
            })?;
    }
    Ok(())
}
