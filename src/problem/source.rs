use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Position anchor for a diagnostic: the whole file, its name, and a byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    contents: Arc<str>,
    filename: PathBuf,
    offset: usize,
}

impl Source {
    /// Anchor at the start of `contents`.
    pub fn new(contents: impl Into<Arc<str>>, filename: impl Into<PathBuf>) -> Self {
        Self {
            contents: contents.into(),
            filename: filename.into(),
            offset: 0,
        }
    }

    /// Sentinel for failures with no real position.
    pub fn empty() -> Self {
        Self::new("", "")
    }

    /// The same file anchored at a different offset.
    pub fn at(&self, offset: usize) -> Self {
        Self {
            contents: Arc::clone(&self.contents),
            filename: self.filename.clone(),
            offset,
        }
    }

    /// Full text of the file.
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Name the file was loaded from.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Byte offset of the anchor.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether this is the [`Source::empty`] sentinel.
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty() && self.filename.as_os_str().is_empty()
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::empty()
    }
}
