//! # linkwatch-fs
//!
//! Everything that turns the local tree into what the build service sees:
//!
//! - [`rules`]: the ignore matcher shared by the enumerator and the watcher
//! - [`enumerate`]: the initial full file listing
//! - [`linked`]: linked-dependency resolution and `.linked_deps/` remapping
//! - [`content`]: base64 reads and forward-slash path normalisation
//! - [`snapshot`]: local + linked files bundled for an initial link

pub mod content;
pub mod enumerate;
pub mod error;
pub mod linked;
pub mod rules;
pub mod snapshot;

pub use enumerate::{list_local_files, walk_files};
pub use error::FsError;
pub use linked::{create_link_config, linked_files, linked_rules, to_builder_path};
pub use rules::IgnoreRules;
pub use snapshot::{build_snapshot, Snapshot};
