//! Artifact collection
//!
//! Scans a build toolchain output tree for package files matching a
//! configured extension and copies them into one consolidated directory.
//! Originals are copied, never moved. Zero matches is not an error; a
//! missing source directory is.

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Destination layout for collected artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectLayout {
    /// Preserve the relative path below the source directory
    #[default]
    Mirrored,
    /// Copy every match directly into the destination root; name collisions
    /// across variants are an error
    Flat,
}

/// Errors for collection operations
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Source directory does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Invalid extension pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("Flat layout name collision on '{name}': {first} and {second}")]
    NameCollision {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Path is not within the scanned directory: {0}")]
    PathNotInRoot(PathBuf),
}

/// One collected artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedArtifact {
    /// Path of the original build output
    pub source: PathBuf,

    /// Path of the copy in the consolidated directory
    pub dest: PathBuf,

    /// Path relative to the consolidated directory
    pub rel_path: PathBuf,

    /// Size in bytes
    pub size: u64,
}

/// Result of a collection pass
#[derive(Debug, Clone)]
pub struct CollectResult {
    /// Collected artifacts, sorted by relative path
    pub artifacts: Vec<CollectedArtifact>,

    /// The consolidated directory (created if it was absent)
    pub dest_dir: PathBuf,
}

/// Collects matching build outputs into a consolidated directory
pub struct Collector {
    source_dir: PathBuf,
    dest_dir: PathBuf,
    matcher: GlobMatcher,
    layout: CollectLayout,
}

impl Collector {
    /// Create a collector for the given extension (no leading dot)
    pub fn new(
        source_dir: PathBuf,
        dest_dir: PathBuf,
        extension: &str,
        layout: CollectLayout,
    ) -> Result<Self, CollectError> {
        let matcher = Glob::new(&format!("**/*.{}", extension))?.compile_matcher();
        Ok(Self {
            source_dir,
            dest_dir,
            matcher,
            layout,
        })
    }

    /// Copy every matching file from the source tree into the destination
    ///
    /// Creates the destination directory if absent. Returns the copied set
    /// sorted by relative destination path.
    pub fn collect(&self) -> Result<CollectResult, CollectError> {
        if !self.source_dir.is_dir() {
            return Err(CollectError::SourceMissing(self.source_dir.clone()));
        }

        fs::create_dir_all(&self.dest_dir)?;

        let mut artifacts = Vec::new();
        // Flat layout: first source path claiming each destination name
        let mut claimed: HashMap<String, PathBuf> = HashMap::new();

        for entry in WalkDir::new(&self.source_dir)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();

            let rel_source = path
                .strip_prefix(&self.source_dir)
                .map_err(|_| CollectError::PathNotInRoot(path.to_path_buf()))?;

            if !self.matcher.is_match(rel_source) {
                continue;
            }

            let rel_dest = match self.layout {
                CollectLayout::Mirrored => rel_source.to_path_buf(),
                CollectLayout::Flat => {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if let Some(first) = claimed.get(&name) {
                        return Err(CollectError::NameCollision {
                            name,
                            first: first.clone(),
                            second: path.to_path_buf(),
                        });
                    }
                    claimed.insert(name.clone(), path.to_path_buf());
                    PathBuf::from(name)
                }
            };

            let dest = self.dest_dir.join(&rel_dest);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let size = fs::copy(path, &dest)?;

            artifacts.push(CollectedArtifact {
                source: path.to_path_buf(),
                dest,
                rel_path: rel_dest,
                size,
            });
        }

        artifacts.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

        Ok(CollectResult {
            artifacts,
            dest_dir: self.dest_dir.clone(),
        })
    }
}

/// List artifact files matching the extension under a directory, sorted by
/// relative path
///
/// Used by the checksum and verify stages, which operate on whatever the
/// consolidated directory currently holds.
pub fn list_artifacts(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, CollectError> {
    let matcher = Glob::new(&format!("**/*.{}", extension))?.compile_matcher();
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|_| CollectError::PathNotInRoot(entry.path().to_path_buf()))?;
        if matcher.is_match(rel) {
            files.push(rel.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}
