//! Integrity verification of the consolidated directory
//!
//! Checks the pairing invariant before archiving: every artifact has exactly
//! one checksum sidecar, every sidecar parses and matches a recomputed
//! digest, and no sidecar is orphaned. Any issue fails the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::checksum::{self, ChecksumAlgorithm};
use crate::collect::{self, CollectError};

/// Errors for verification operations
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Collection error: {0}")]
    Collect(#[from] CollectError),

    #[error("Directory does not exist: {0}")]
    DirMissing(PathBuf),
}

/// A single integrity issue found during verification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// Artifact has no checksum sidecar
    MissingChecksum { artifact: String },

    /// Sidecar exists but its artifact does not
    OrphanChecksum { sidecar: String },

    /// Sidecar digest does not match the artifact contents
    DigestMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },

    /// Sidecar body could not be parsed
    MalformedChecksum { sidecar: String },
}

impl IntegrityIssue {
    /// Human-readable description for log output
    pub fn describe(&self) -> String {
        match self {
            IntegrityIssue::MissingChecksum { artifact } => {
                format!("missing checksum for {}", artifact)
            }
            IntegrityIssue::OrphanChecksum { sidecar } => {
                format!("orphan checksum {}", sidecar)
            }
            IntegrityIssue::DigestMismatch {
                artifact,
                expected,
                actual,
            } => format!(
                "digest mismatch for {}: expected {}, got {}",
                artifact, expected, actual
            ),
            IntegrityIssue::MalformedChecksum { sidecar } => {
                format!("malformed checksum {}", sidecar)
            }
        }
    }
}

/// Result of verifying a consolidated directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Artifact files found
    pub artifact_count: usize,

    /// Checksum sidecars found
    pub checksum_count: usize,

    /// Issues found; empty means the directory passed
    pub issues: Vec<IntegrityIssue>,
}

impl VerifyReport {
    /// True when no issues were found
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Verify the pairing invariant and digest integrity of a consolidated
/// directory
pub fn verify_tree(
    dir: &Path,
    extension: &str,
    algorithm: ChecksumAlgorithm,
) -> Result<VerifyReport, VerifyError> {
    if !dir.is_dir() {
        return Err(VerifyError::DirMissing(dir.to_path_buf()));
    }

    let artifacts = collect::list_artifacts(dir, extension)?;
    let artifact_set: BTreeSet<PathBuf> = artifacts.iter().cloned().collect();

    let sidecar_ext = format!("{}.{}", extension, algorithm.suffix());
    let mut sidecars = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(dir) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };
        if rel.to_string_lossy().ends_with(&format!(".{}", sidecar_ext)) {
            sidecars.push(rel);
        }
    }
    sidecars.sort();

    let sidecar_for = |artifact: &Path| checksum::sidecar_path(artifact, algorithm);
    let sidecar_set: BTreeSet<PathBuf> = sidecars.iter().cloned().collect();

    let mut issues = Vec::new();

    for artifact in &artifacts {
        let sidecar = sidecar_for(artifact);
        if !sidecar_set.contains(&sidecar) {
            issues.push(IntegrityIssue::MissingChecksum {
                artifact: artifact.to_string_lossy().to_string(),
            });
            continue;
        }

        // A sidecar that is not valid UTF-8 is malformed, not a fatal read
        // error
        let raw = fs::read(dir.join(&sidecar))?;
        let expected = match std::str::from_utf8(&raw)
            .ok()
            .and_then(|body| checksum::parse_sidecar(body, algorithm))
        {
            Some(digest) => digest,
            None => {
                issues.push(IntegrityIssue::MalformedChecksum {
                    sidecar: sidecar.to_string_lossy().to_string(),
                });
                continue;
            }
        };

        let actual = algorithm.digest_file(&dir.join(artifact))?;
        if actual != expected {
            issues.push(IntegrityIssue::DigestMismatch {
                artifact: artifact.to_string_lossy().to_string(),
                expected,
                actual,
            });
        }
    }

    for sidecar in &sidecars {
        // Strip the sidecar suffix to recover the artifact path
        let as_str = sidecar.to_string_lossy();
        let artifact = PathBuf::from(
            as_str
                .strip_suffix(&format!(".{}", algorithm.suffix()))
                .unwrap_or(&as_str),
        );
        if !artifact_set.contains(&artifact) {
            issues.push(IntegrityIssue::OrphanChecksum {
                sidecar: sidecar.to_string_lossy().to_string(),
            });
        }
    }

    Ok(VerifyReport {
        artifact_count: artifacts.len(),
        checksum_count: sidecars.len(),
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum_tree;
    use tempfile::TempDir;

    fn create_checksummed_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app-free-debug.apk"), b"free debug").unwrap();
        fs::write(dir.path().join("app-paid-release.apk"), b"paid release").unwrap();
        checksum_tree(dir.path(), "apk", ChecksumAlgorithm::Sha256).unwrap();
        dir
    }

    #[test]
    fn test_verify_passes_after_checksum_stage() {
        let dir = create_checksummed_dir();
        let report = verify_tree(dir.path(), "apk", ChecksumAlgorithm::Sha256).unwrap();

        assert!(report.passed());
        assert_eq!(report.artifact_count, 2);
        assert_eq!(report.checksum_count, 2);
    }

    #[test]
    fn test_counts_match_after_checksum_stage() {
        let dir = create_checksummed_dir();
        let report = verify_tree(dir.path(), "apk", ChecksumAlgorithm::Sha256).unwrap();
        assert_eq!(report.artifact_count, report.checksum_count);
    }

    #[test]
    fn test_detects_missing_checksum() {
        let dir = create_checksummed_dir();
        fs::remove_file(dir.path().join("app-free-debug.apk.sha256")).unwrap();

        let report = verify_tree(dir.path(), "apk", ChecksumAlgorithm::Sha256).unwrap();
        assert!(!report.passed());
        assert!(report.issues.iter().any(|i| matches!(
            i,
            IntegrityIssue::MissingChecksum { artifact } if artifact == "app-free-debug.apk"
        )));
    }

    #[test]
    fn test_detects_orphan_checksum() {
        let dir = create_checksummed_dir();
        fs::remove_file(dir.path().join("app-free-debug.apk")).unwrap();

        let report = verify_tree(dir.path(), "apk", ChecksumAlgorithm::Sha256).unwrap();
        assert!(report.issues.iter().any(|i| matches!(
            i,
            IntegrityIssue::OrphanChecksum { sidecar } if sidecar == "app-free-debug.apk.sha256"
        )));
    }

    #[test]
    fn test_detects_tampered_artifact() {
        let dir = create_checksummed_dir();
        fs::write(dir.path().join("app-free-debug.apk"), b"tampered").unwrap();

        let report = verify_tree(dir.path(), "apk", ChecksumAlgorithm::Sha256).unwrap();
        assert!(report.issues.iter().any(|i| matches!(
            i,
            IntegrityIssue::DigestMismatch { artifact, .. } if artifact == "app-free-debug.apk"
        )));
    }

    #[test]
    fn test_detects_malformed_sidecar() {
        let dir = create_checksummed_dir();
        fs::write(dir.path().join("app-free-debug.apk.sha256"), b"garbage\n").unwrap();

        let report = verify_tree(dir.path(), "apk", ChecksumAlgorithm::Sha256).unwrap();
        assert!(report.issues.iter().any(|i| matches!(
            i,
            IntegrityIssue::MalformedChecksum { .. }
        )));
    }

    #[test]
    fn test_detects_non_utf8_sidecar_as_malformed() {
        let dir = create_checksummed_dir();
        fs::write(
            dir.path().join("app-free-debug.apk.sha256"),
            [0xff, 0xfe, 0x00, 0x80],
        )
        .unwrap();

        let report = verify_tree(dir.path(), "apk", ChecksumAlgorithm::Sha256).unwrap();
        assert!(report.issues.iter().any(|i| matches!(
            i,
            IntegrityIssue::MalformedChecksum { sidecar } if sidecar == "app-free-debug.apk.sha256"
        )));
    }

    #[test]
    fn test_empty_dir_passes() {
        let dir = TempDir::new().unwrap();
        let report = verify_tree(dir.path(), "apk", ChecksumAlgorithm::Sha256).unwrap();
        assert!(report.passed());
        assert_eq!(report.artifact_count, 0);
    }

    #[test]
    fn test_missing_dir_is_fatal() {
        let err = verify_tree(
            Path::new("/nonexistent/apk"),
            "apk",
            ChecksumAlgorithm::Sha256,
        )
        .unwrap_err();
        assert!(matches!(err, VerifyError::DirMissing(_)));
    }
}
