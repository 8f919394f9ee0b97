//! Checksum generation
//!
//! Writes one digest sidecar file per collected artifact. Sidecars live next
//! to the artifact as `<name>.<alg>` and hold a coreutils-compatible line
//! (`<hex>  <file name>`), so `sha256sum -c` / `shasum -c` can verify them.
//! Digests are always computed on the consolidated copy, never on the
//! original build output.

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::collect::{self, CollectError};

/// Digest algorithm for artifact sidecars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Sha256,
    Sha1,
}

impl ChecksumAlgorithm {
    /// Sidecar file suffix (without the dot)
    pub fn suffix(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha1 => "sha1",
        }
    }

    /// Hex digest length for this algorithm
    pub fn hex_len(&self) -> usize {
        match self {
            ChecksumAlgorithm::Sha256 => 64,
            ChecksumAlgorithm::Sha1 => 40,
        }
    }

    /// Compute the hex digest of a byte slice
    pub fn digest_bytes(&self, data: &[u8]) -> String {
        match self {
            ChecksumAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(data);
                hex::encode(hasher.finalize())
            }
            ChecksumAlgorithm::Sha1 => {
                let mut hasher = Sha1::new();
                hasher.update(data);
                hex::encode(hasher.finalize())
            }
        }
    }

    /// Compute the hex digest of a file's contents
    pub fn digest_file(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        Ok(self.digest_bytes(&contents))
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Errors for checksum operations
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Collection error: {0}")]
    Collect(#[from] CollectError),

    #[error("Artifact has no file name: {0}")]
    NoFileName(PathBuf),
}

/// One written checksum sidecar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumRecord {
    /// Artifact path relative to the consolidated directory
    pub artifact: PathBuf,

    /// Sidecar path relative to the consolidated directory
    pub sidecar: PathBuf,

    /// Hex digest of the artifact contents
    pub digest: String,
}

/// Sidecar path for an artifact: the artifact path with `.<alg>` appended
pub fn sidecar_path(artifact: &Path, algorithm: ChecksumAlgorithm) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(".");
    name.push(algorithm.suffix());
    PathBuf::from(name)
}

/// Format a sidecar body for the given digest and artifact file name
fn sidecar_body(digest: &str, file_name: &str) -> String {
    format!("{}  {}\n", digest, file_name)
}

/// Parse a sidecar body, returning the hex digest
///
/// Accepts the coreutils format written by [`checksum_tree`]; returns None
/// for an empty or malformed body.
pub fn parse_sidecar(body: &str, algorithm: ChecksumAlgorithm) -> Option<String> {
    let digest = body.split_whitespace().next()?;
    if digest.len() != algorithm.hex_len() {
        return None;
    }
    if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(digest.to_ascii_lowercase())
}

/// Write one checksum sidecar per artifact under the consolidated directory
///
/// Idempotent: rerunning overwrites prior sidecars with identical content
/// given identical artifacts. Returns records sorted by artifact path. A
/// failure to read any artifact aborts without writing that sidecar.
pub fn checksum_tree(
    dir: &Path,
    extension: &str,
    algorithm: ChecksumAlgorithm,
) -> Result<Vec<ChecksumRecord>, ChecksumError> {
    let artifacts = collect::list_artifacts(dir, extension)?;
    let mut records = Vec::with_capacity(artifacts.len());

    for rel_path in artifacts {
        let full_path = dir.join(&rel_path);
        let digest = algorithm.digest_file(&full_path)?;

        let file_name = rel_path
            .file_name()
            .ok_or_else(|| ChecksumError::NoFileName(rel_path.clone()))?
            .to_string_lossy()
            .to_string();

        let sidecar_rel = sidecar_path(&rel_path, algorithm);
        fs::write(dir.join(&sidecar_rel), sidecar_body(&digest, &file_name))?;

        records.push(ChecksumRecord {
            artifact: rel_path,
            sidecar: sidecar_rel,
            digest,
        });
    }

    Ok(records)
}
