//! Initial full listing of a tree.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::content::to_slash;
use crate::error::{io_err, FsError};
use crate::rules::IgnoreRules;

/// Project-relative, forward-slash paths of every non-ignored file under
/// `root`, sorted.
///
/// Empty files are listed like any other. Filesystem errors (missing root,
/// permission denied mid-walk) are returned as-is; nothing is retried.
pub fn list_local_files(root: &Path, rules: &IgnoreRules) -> Result<Vec<String>, FsError> {
    let files = walk_files(root, rules)?;
    Ok(files
        .iter()
        .filter_map(|path| path.strip_prefix(root).ok())
        .map(to_slash)
        .collect())
}

/// Absolute paths of every non-ignored file under `root`, sorted.
///
/// `root` may be any directory inside the tree `rules` belong to.
pub fn walk_files(root: &Path, rules: &IgnoreRules) -> Result<Vec<PathBuf>, FsError> {
    let meta = std::fs::metadata(root).map_err(|e| io_err(root, e))?;
    if !meta.is_dir() {
        return Err(FsError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let filter_rules = rules.clone();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            !filter_rules.is_ignored(entry.path(), is_dir)
        })
        .build();

    let mut files = Vec::new();
    for result in walker {
        let entry = result?;
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        // Symlinked files are followed for content; symlinked dirs are not walked.
        let is_file = file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
        if is_file {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, contents).expect("write");
    }

    #[test]
    fn lists_files_skips_node_modules_keeps_empty_files() {
        let root = TempDir::new().expect("root");
        touch(root.path(), "a.js", "console.log(1)");
        touch(root.path(), "node_modules/dep/x.js", "module.exports = 1");
        touch(root.path(), "b.js", "");

        let rules = IgnoreRules::for_project(root.path(), &[]).expect("rules");
        let files = list_local_files(root.path(), &rules).expect("list");
        assert_eq!(files, ["a.js", "b.js"]);
    }

    #[test]
    fn nested_paths_are_forward_slash_and_sorted() {
        let root = TempDir::new().expect("root");
        touch(root.path(), "react/components/B.tsx", "b");
        touch(root.path(), "manifest.json", "{}");
        touch(root.path(), "node/index.ts", "n");
        touch(root.path(), ".git/HEAD", "ref");

        let rules = IgnoreRules::for_project(root.path(), &[]).expect("rules");
        let files = list_local_files(root.path(), &rules).expect("list");
        assert_eq!(
            files,
            ["manifest.json", "node/index.ts", "react/components/B.tsx"]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = TempDir::new().expect("root");
        let missing = root.path().join("nope");
        let rules = IgnoreRules::for_project(&missing, &[]).expect("rules");
        let err = list_local_files(&missing, &rules).unwrap_err();
        assert!(matches!(err, FsError::Io { .. }), "got: {err}");
    }

    #[test]
    fn file_root_is_rejected() {
        let root = TempDir::new().expect("root");
        touch(root.path(), "file.txt", "x");
        let file = root.path().join("file.txt");
        let rules = IgnoreRules::for_project(root.path(), &[]).expect("rules");
        assert!(matches!(
            list_local_files(&file, &rules),
            Err(FsError::NotADirectory { .. })
        ));
    }
}
