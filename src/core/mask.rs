//! Include/exclude masking over a directory tree.
//!
//! Masks are glob patterns matched against the path relative to the walk
//! root, using `/` separators. An empty include list matches everything;
//! exclude patterns take precedence.

use std::io;
use std::path::{Path, PathBuf};

use glob::{Pattern, PatternError};
use walkdir::WalkDir;

/// Compiled include/exclude patterns.
#[derive(Debug, Clone)]
pub struct FileMask {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

/// A file matched during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedEntry {
    /// Path relative to the walk root, `/`-separated.
    pub relative_path: String,
    /// Absolute path on disk.
    pub absolute_path: PathBuf,
}

impl FileMask {
    /// Compile masks from glob pattern strings.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, PatternError> {
        Ok(Self {
            include: include
                .iter()
                .map(|p| Pattern::new(p))
                .collect::<Result<_, _>>()?,
            exclude: exclude
                .iter()
                .map(|p| Pattern::new(p))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Whether a relative path passes the mask.
    pub fn matches(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| p.matches(relative_path));
        included && !self.exclude.iter().any(|p| p.matches(relative_path))
    }
}

/// Walk `root` recursively and return all files passing the mask.
///
/// Entries are returned in walk order; directories themselves are not
/// captured, only their files.
pub fn enumerate_tree(root: &Path, mask: &FileMask) -> io::Result<Vec<MaskedEntry>> {
    let mut matched = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            e.into_io_error()
                .unwrap_or_else(|| io::Error::other("filesystem loop during walk"))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(io::Error::other)?;
        let relative_path = relative
            .iter()
            .map(|c| c.to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if mask.matches(&relative_path) {
            matched.push(MaskedEntry {
                relative_path,
                absolute_path: entry.path().to_path_buf(),
            });
        }
    }

    Ok(matched)
}
