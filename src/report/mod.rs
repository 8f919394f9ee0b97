//! Pipeline report (pipeline_report.json)
//!
//! Machine-readable record of a pipeline run: per-stage status and duration,
//! artifact and checksum counts, and the archive location and tar digest.
//! Written next to the archive so a rerun overwrites the prior report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Schema version for pipeline_report.json
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const REPORT_SCHEMA_ID: &str = "apkpack/pipeline_report@1";

/// Pipeline stage names, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Tests,
    Assemble,
    Collect,
    Checksum,
    Verify,
    Archive,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Tests => "tests",
            Stage::Assemble => "assemble",
            Stage::Collect => "collect",
            Stage::Checksum => "checksum",
            Stage::Verify => "verify",
            Stage::Archive => "archive",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    Failed,
    Skipped,
}

/// Record of one executed (or skipped) stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,

    pub status: StageStatus,

    /// Wall-clock duration in milliseconds (0 for skipped stages)
    pub duration_ms: u64,

    /// Stage-specific detail, e.g. a count or an error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Pipeline report (pipeline_report.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Run identifier (ULID)
    pub run_id: String,

    /// When the report was created
    pub created_at: DateTime<Utc>,

    /// Overall status: success only when every non-skipped stage succeeded
    pub status: StageStatus,

    /// Per-stage records in execution order
    pub stages: Vec<StageReport>,

    /// Artifacts collected
    pub artifact_count: usize,

    /// Checksum sidecars written
    pub checksum_count: usize,

    /// Archive path, when the archive stage ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,

    /// SHA-256 of the uncompressed tar stream, when the archive stage ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_tar_sha256: Option<String>,

    /// Wall-clock duration of the entire run in milliseconds
    pub duration_ms: u64,

    /// Human-readable summary
    pub human_summary: String,
}

impl PipelineReport {
    /// Create an empty report for a new run
    pub fn new(run_id: String) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            schema_id: REPORT_SCHEMA_ID.to_string(),
            run_id,
            created_at: Utc::now(),
            status: StageStatus::Success,
            stages: Vec::new(),
            artifact_count: 0,
            checksum_count: 0,
            archive_path: None,
            archive_tar_sha256: None,
            duration_ms: 0,
            human_summary: String::new(),
        }
    }

    /// Append a stage record, folding its status into the overall status
    pub fn record_stage(
        &mut self,
        stage: Stage,
        status: StageStatus,
        duration_ms: u64,
        detail: Option<String>,
    ) {
        if status == StageStatus::Failed {
            self.status = StageStatus::Failed;
        }
        self.stages.push(StageReport {
            stage,
            status,
            duration_ms,
            detail,
        });
    }

    /// Finalize totals and the human summary
    pub fn finalize(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
        let executed = self
            .stages
            .iter()
            .filter(|s| s.status != StageStatus::Skipped)
            .count();
        let failed = self
            .stages
            .iter()
            .filter(|s| s.status == StageStatus::Failed)
            .count();
        self.human_summary = if failed == 0 {
            format!(
                "{} stage(s) succeeded; {} artifact(s), {} checksum(s)",
                executed, self.artifact_count, self.checksum_count
            )
        } else {
            format!("{} of {} stage(s) failed", failed, executed)
        };
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to a file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// Load from a file
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
