//! Archiving of the consolidated directory
//!
//! Bundles the full recursive content of the consolidated directory
//! (artifacts plus checksum sidecars) into one gzip-compressed canonical tar
//! at a fixed destination, overwriting any prior archive. Canonical rules:
//! sorted paths, mtime 0, uid/gid 0, mode 644 (755 for directories and
//! executables). Unchanged input therefore produces an identical tar stream,
//! which the reported tar digest makes checkable.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, Header};
use walkdir::WalkDir;

use flate2::write::GzEncoder;
use flate2::Compression;

/// Errors for archive operations
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Input directory does not exist: {0}")]
    InputMissing(PathBuf),

    #[error("Path is not within the input directory: {0}")]
    PathNotInRoot(PathBuf),
}

/// Summary of a created archive
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    /// Path of the written archive
    pub path: PathBuf,

    /// Entries in the archive (files and directories)
    pub entry_count: usize,

    /// SHA-256 of the uncompressed tar stream
    pub tar_sha256: String,

    /// Compressed size in bytes
    pub compressed_bytes: u64,
}

/// Archives a consolidated directory into a canonical tar.gz
pub struct Archiver {
    input_dir: PathBuf,
    dest_path: PathBuf,
}

enum EntryKind {
    File,
    Directory,
}

impl Archiver {
    pub fn new(input_dir: PathBuf, dest_path: PathBuf) -> Self {
        Self {
            input_dir,
            dest_path,
        }
    }

    /// Collect all entries of the input directory, sorted by relative path
    fn collect_entries(&self) -> Result<BTreeMap<PathBuf, EntryKind>, ArchiveError> {
        let mut entries = BTreeMap::new();

        for entry in WalkDir::new(&self.input_dir)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry?;
            let path = entry.path();

            let rel_path = path
                .strip_prefix(&self.input_dir)
                .map_err(|_| ArchiveError::PathNotInRoot(path.to_path_buf()))?;

            if rel_path.as_os_str().is_empty() {
                continue;
            }

            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                // Symlinks and special files are not expected in a
                // consolidated directory
                continue;
            };

            entries.insert(rel_path.to_path_buf(), kind);
        }

        Ok(entries)
    }

    /// Write the archive, overwriting any existing file at the destination
    ///
    /// Creates the destination directory if absent. Membership equals the
    /// full recursive content of the input directory at invocation time.
    pub fn create(&self) -> Result<ArchiveSummary, ArchiveError> {
        if !self.input_dir.is_dir() {
            return Err(ArchiveError::InputMissing(self.input_dir.clone()));
        }

        let entries = self.collect_entries()?;

        let mut tar_buffer = Vec::new();
        {
            let mut builder = Builder::new(&mut tar_buffer);

            for (rel_path, kind) in &entries {
                let full_path = self.input_dir.join(rel_path);

                match kind {
                    EntryKind::File => {
                        let mut file = File::open(&full_path)?;
                        let mut contents = Vec::new();
                        file.read_to_end(&mut contents)?;

                        let mut header = Header::new_gnu();
                        header.set_path(rel_path)?;
                        header.set_size(contents.len() as u64);
                        header.set_mtime(0);
                        header.set_uid(0);
                        header.set_gid(0);
                        let mode = if is_executable(&full_path) { 0o755 } else { 0o644 };
                        header.set_mode(mode);
                        header.set_cksum();

                        builder.append(&header, contents.as_slice())?;
                    }
                    EntryKind::Directory => {
                        let mut header = Header::new_gnu();
                        header.set_path(format!("{}/", rel_path.display()))?;
                        header.set_size(0);
                        header.set_mtime(0);
                        header.set_uid(0);
                        header.set_gid(0);
                        header.set_mode(0o755);
                        header.set_entry_type(tar::EntryType::Directory);
                        header.set_cksum();

                        builder.append(&header, &[] as &[u8])?;
                    }
                }
            }

            builder.finish()?;
        }

        let tar_sha256 = {
            let mut hasher = Sha256::new();
            hasher.update(&tar_buffer);
            hex::encode(hasher.finalize())
        };

        if let Some(parent) = self.dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // File::create truncates, so a prior archive is overwritten
        let file = File::create(&self.dest_path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&tar_buffer)?;
        let file = encoder.finish()?;
        file.sync_all()?;

        let compressed_bytes = fs::metadata(&self.dest_path)?.len();

        Ok(ArchiveSummary {
            path: self.dest_path.clone(),
            entry_count: entries.len(),
            tar_sha256,
            compressed_bytes,
        })
    }
}

/// Check if a file is executable
fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(path) {
            return metadata.permissions().mode() & 0o111 != 0;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    false
}
