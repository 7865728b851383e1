//! File-access context
//!
//! Stores are always addressed relative to a directory-scoped
//! [`FileContext`]. An absolute path given without a context is split into
//! a context for its directory plus the bare file name, so absolute and
//! relative inputs are watched and resolved the same way.

use std::path::{Path, PathBuf};

/// Directory that relative store paths are resolved against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    root: PathBuf,
}

impl FileContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` against this context
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Split an absolute path into a context for its directory and the file name
///
/// Returns `None` for relative paths and for paths without a file name
/// component.
pub fn split_absolute(path: &Path) -> Option<(FileContext, PathBuf)> {
    if !path.is_absolute() {
        return None;
    }

    let file_name = path.file_name()?;
    let directory = path.parent()?;
    Some((FileContext::new(directory), PathBuf::from(file_name)))
}
