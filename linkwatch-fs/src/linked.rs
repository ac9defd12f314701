//! Linked-dependency resolution.
//!
//! A linked dependency is a local package that replaces its fetched
//! counterpart. Its files are presented to the build service under
//! `.linked_deps/<name>/<relative path>`, as if vendored in the app.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use linkwatch_core::{FileEntry, LinkConfig, LinkDeclaration, LINKED_DEPS_DIR};

use crate::content::{read_base64_if_exists, to_slash};
use crate::enumerate::walk_files;
use crate::error::FsError;
use crate::rules::IgnoreRules;

/// Files whose presence marks a directory as a package.
const PACKAGE_MARKERS: &[&str] = &["package.json", "manifest.json"];

/// Resolve declared links into a [`LinkConfig`].
///
/// Relative declaration paths are resolved against `project_root`. Links
/// whose path is missing, not a directory, or not a package are dropped with
/// a warning; they never fail the link.
pub fn create_link_config(declarations: &[LinkDeclaration], project_root: &Path) -> LinkConfig {
    let mut metadata = BTreeMap::new();
    let mut ignores = BTreeMap::new();

    for decl in declarations {
        match verify_package_dir(&project_root.join(&decl.path)) {
            Ok(root) => {
                metadata.insert(decl.name.clone(), root);
                if !decl.ignore.is_empty() {
                    ignores.insert(decl.name.clone(), decl.ignore.clone());
                }
            }
            Err(reason) => {
                tracing::warn!(
                    dependency = %decl.name,
                    path = %decl.path.display(),
                    reason = %reason,
                    "skipping linked dependency",
                );
            }
        }
    }

    LinkConfig { metadata, ignores }
}

fn verify_package_dir(path: &Path) -> Result<PathBuf, String> {
    let canonical = std::fs::canonicalize(path).map_err(|e| e.to_string())?;
    if !canonical.is_dir() {
        return Err("not a directory".to_string());
    }
    if !PACKAGE_MARKERS.iter().any(|m| canonical.join(m).is_file()) {
        return Err(format!("no {} found", PACKAGE_MARKERS.join(" or ")));
    }
    std::fs::read_dir(&canonical).map_err(|e| e.to_string())?;
    Ok(canonical)
}

/// Every file of every linked dependency, remapped under `.linked_deps/`.
///
/// Honors each dependency's own ignore list on top of the defaults.
pub fn linked_files(config: &LinkConfig) -> Result<Vec<FileEntry>, FsError> {
    let mut entries = Vec::new();
    for (name, root) in &config.metadata {
        let rules = IgnoreRules::with_patterns(root, config.ignores_for(name))?;
        for path in walk_files(root, &rules)? {
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            match read_base64_if_exists(&path)? {
                Some(content) => entries.push(FileEntry {
                    path: linked_path(name, relative),
                    content,
                    linked: true,
                }),
                None => {
                    tracing::warn!(path = %path.display(), "linked file vanished before read");
                }
            }
        }
    }
    Ok(entries)
}

/// One rule set per linked dependency, rooted at its canonical directory.
///
/// The watcher observes each root and filters its events with these rules.
pub fn linked_rules(config: &LinkConfig) -> Result<Vec<IgnoreRules>, FsError> {
    config
        .metadata
        .iter()
        .map(|(name, root)| IgnoreRules::with_patterns(root, config.ignores_for(name)))
        .collect()
}

/// Map an absolute local path to the path the build service knows it by.
///
/// Linked roots win over the project root; `None` means the path belongs to
/// neither tree.
pub fn to_builder_path(path: &Path, project_root: &Path, config: &LinkConfig) -> Option<String> {
    if let Some((name, root)) = config.owner_of(path) {
        let relative = path.strip_prefix(root).ok()?;
        return Some(linked_path(name, relative));
    }
    let relative = path.strip_prefix(project_root).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(to_slash(relative))
}

fn linked_path(name: &str, relative: &Path) -> String {
    format!("{LINKED_DEPS_DIR}/{name}/{}", to_slash(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_with(name: &str, root: &str) -> LinkConfig {
        let mut config = LinkConfig::default();
        config.metadata.insert(name.into(), PathBuf::from(root));
        config
    }

    #[test]
    fn maps_linked_file_under_linked_deps() {
        let config = config_with("vtex.lib", "/home/u/lib");
        let mapped = to_builder_path(
            Path::new("/home/u/lib/src/x.js"),
            Path::new("/home/u/app"),
            &config,
        );
        assert_eq!(mapped.as_deref(), Some(".linked_deps/vtex.lib/src/x.js"));
    }

    #[test]
    fn maps_project_file_relative_to_root() {
        let config = config_with("vtex.lib", "/home/u/lib");
        let mapped = to_builder_path(
            Path::new("/home/u/app/react/index.tsx"),
            Path::new("/home/u/app"),
            &config,
        );
        assert_eq!(mapped.as_deref(), Some("react/index.tsx"));
    }

    #[test]
    fn sibling_with_common_prefix_is_not_linked() {
        let config = config_with("vtex.lib", "/home/u/lib");
        let mapped = to_builder_path(
            Path::new("/home/u/library/x.js"),
            Path::new("/home/u"),
            &config,
        );
        assert_eq!(mapped.as_deref(), Some("library/x.js"));
    }

    #[test]
    fn unrelated_path_maps_to_none() {
        let config = LinkConfig::default();
        assert!(to_builder_path(Path::new("/tmp/x.js"), Path::new("/home/u/app"), &config).is_none());
    }

    #[test]
    fn invalid_links_are_dropped_not_fatal() {
        let workspace = TempDir::new().expect("workspace");
        let good = workspace.path().join("good");
        let not_a_package = workspace.path().join("plain");
        fs::create_dir_all(&good).expect("mkdir");
        fs::create_dir_all(&not_a_package).expect("mkdir");
        fs::write(good.join("package.json"), "{}").expect("write");

        let decls = vec![
            LinkDeclaration {
                name: "good".into(),
                path: good.clone(),
                ignore: vec!["dist/".into()],
            },
            LinkDeclaration {
                name: "plain".into(),
                path: not_a_package,
                ignore: vec![],
            },
            LinkDeclaration {
                name: "missing".into(),
                path: workspace.path().join("missing"),
                ignore: vec![],
            },
        ];

        let config = create_link_config(&decls, workspace.path());
        assert_eq!(config.len(), 1);
        assert_eq!(
            config.metadata.get("good"),
            Some(&fs::canonicalize(&good).expect("canonical"))
        );
        assert_eq!(config.ignores_for("good"), ["dist/".to_string()]);
    }

    #[test]
    fn relative_declarations_resolve_against_project_root() {
        let workspace = TempDir::new().expect("workspace");
        let app = workspace.path().join("app");
        let lib = workspace.path().join("lib");
        fs::create_dir_all(&app).expect("mkdir");
        fs::create_dir_all(&lib).expect("mkdir");
        fs::write(lib.join("manifest.json"), "{}").expect("write");

        let decls = vec![LinkDeclaration {
            name: "vtex.lib".into(),
            path: PathBuf::from("../lib"),
            ignore: vec![],
        }];
        let config = create_link_config(&decls, &app);
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn linked_files_respect_per_dependency_ignores() {
        let workspace = TempDir::new().expect("workspace");
        let lib = workspace.path().join("lib");
        for rel in ["package.json", "src/x.js", "dist/x.js", "node_modules/y/i.js"] {
            let path = lib.join(rel);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, "x").expect("write");
        }

        let decls = vec![LinkDeclaration {
            name: "vtex.lib".into(),
            path: lib,
            ignore: vec!["dist/".into()],
        }];
        let config = create_link_config(&decls, workspace.path());
        let files = linked_files(&config).expect("linked files");

        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            [".linked_deps/vtex.lib/package.json", ".linked_deps/vtex.lib/src/x.js"]
        );
        assert!(files.iter().all(|f| f.linked));
    }
}
