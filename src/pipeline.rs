//! Pipeline orchestration
//!
//! Fixed sequential stage order, each stage gated on the success of all
//! prior stages: tests → assemble → collect → checksum → verify → archive.
//! Fail-fast: the first stage error aborts the run with no retries and no
//! rollback. A pipeline report is written next to the archive, including on
//! failure, so the failed stage is recorded.

use std::io;
use std::path::PathBuf;
use std::time::Instant;

use thiserror::Error;
use ulid::Ulid;

use crate::archive::{ArchiveError, Archiver};
use crate::build::{BuildError, BuildRunner};
use crate::checksum::{self, ChecksumError};
use crate::collect::{CollectError, Collector};
use crate::config::{ConfigError, PackConfig};
use crate::report::{PipelineReport, Stage, StageStatus};
use crate::verify::{self, VerifyError};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("collection error: {0}")]
    Collect(#[from] CollectError),

    #[error("checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    #[error("verification error: {0}")]
    Verify(#[from] VerifyError),

    #[error("integrity check failed with {issue_count} issue(s)")]
    Integrity { issue_count: usize },

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 1,
            PipelineError::Build(_) => 30,
            PipelineError::Collect(_) => 40,
            PipelineError::Checksum(_) => 50,
            PipelineError::Archive(_) => 60,
            PipelineError::Verify(_) => 70,
            PipelineError::Integrity { .. } => 70,
            PipelineError::Io(_) => 1,
            PipelineError::Serialization(_) => 1,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline options beyond the config file
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Skip the test phase
    pub skip_tests: bool,

    /// Skip the assemble phase
    pub skip_build: bool,

    /// Verbose diagnostics on stderr
    pub verbose: bool,
}

/// Pipeline execution context
pub struct Pipeline {
    config: PackConfig,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(config: PackConfig, options: PipelineOptions) -> Self {
        Self { config, options }
    }

    /// Run the full pipeline and write the report
    ///
    /// Returns the report on success; an unwritable report is an error of
    /// its own. On a stage failure the report write is best effort, with
    /// the failed stage recorded, and the stage error is propagated.
    pub fn execute(&self) -> PipelineResult<PipelineReport> {
        let start = Instant::now();
        let run_id = Ulid::new().to_string();
        let mut report = PipelineReport::new(run_id.clone());

        if self.options.verbose {
            eprintln!("Pipeline run {}", run_id);
        }

        let result = self.execute_stages(&mut report);

        report.finalize(start.elapsed().as_millis() as u64);
        match result {
            Ok(()) => {
                self.write_report(&report)?;
                Ok(report)
            }
            Err(e) => {
                if let Err(write_err) = self.write_report(&report) {
                    eprintln!("Warning: could not write pipeline report: {}", write_err);
                }
                Err(e)
            }
        }
    }

    fn execute_stages(&self, report: &mut PipelineReport) -> PipelineResult<()> {
        // 1. Tests
        self.run_tool_phase(
            report,
            Stage::Tests,
            self.options.skip_tests,
            &self.config.build.test_tasks,
        )?;

        // 2. Assemble every declared variant
        let assemble_tasks = self.config.assemble_tasks();
        self.run_tool_phase(
            report,
            Stage::Assemble,
            self.options.skip_build,
            &assemble_tasks,
        )?;

        // 3. Collect
        let stage_start = Instant::now();
        let collector = Collector::new(
            self.config.source_dir(),
            self.config.consolidated_dir(),
            &self.config.outputs.extension,
            self.config.outputs.layout,
        )
        .map_err(|e| self.fail_stage(report, Stage::Collect, stage_start, e))?;

        let collected = collector
            .collect()
            .map_err(|e| self.fail_stage(report, Stage::Collect, stage_start, e))?;

        for artifact in &collected.artifacts {
            println!("Collected: {}", artifact.rel_path.display());
        }
        println!(
            "Collected {} artifact(s) into: {}",
            collected.artifacts.len(),
            collected.dest_dir.display()
        );
        report.artifact_count = collected.artifacts.len();
        report.record_stage(
            Stage::Collect,
            StageStatus::Success,
            stage_start.elapsed().as_millis() as u64,
            Some(format!("{} artifact(s)", collected.artifacts.len())),
        );

        // 4. Checksum
        let stage_start = Instant::now();
        let records = checksum::checksum_tree(
            &collected.dest_dir,
            &self.config.outputs.extension,
            self.config.checksum.algorithm,
        )
        .map_err(|e| self.fail_stage(report, Stage::Checksum, stage_start, e))?;

        for record in &records {
            println!("Checksum written: {}", record.sidecar.display());
        }
        report.checksum_count = records.len();
        report.record_stage(
            Stage::Checksum,
            StageStatus::Success,
            stage_start.elapsed().as_millis() as u64,
            Some(format!("{} checksum(s)", records.len())),
        );

        // 5. Verify pairing and digests before archiving
        let stage_start = Instant::now();
        let verify_report = verify::verify_tree(
            &collected.dest_dir,
            &self.config.outputs.extension,
            self.config.checksum.algorithm,
        )
        .map_err(|e| self.fail_stage(report, Stage::Verify, stage_start, e))?;

        if !verify_report.passed() {
            for issue in &verify_report.issues {
                eprintln!("Integrity issue: {}", issue.describe());
            }
            let err = PipelineError::Integrity {
                issue_count: verify_report.issues.len(),
            };
            return Err(self.fail_stage(report, Stage::Verify, stage_start, err));
        }
        report.record_stage(
            Stage::Verify,
            StageStatus::Success,
            stage_start.elapsed().as_millis() as u64,
            Some(format!(
                "{} artifact(s), {} checksum(s)",
                verify_report.artifact_count, verify_report.checksum_count
            )),
        );

        // 6. Archive
        let stage_start = Instant::now();
        let archiver = Archiver::new(collected.dest_dir.clone(), self.config.archive_path());
        let summary = archiver
            .create()
            .map_err(|e| self.fail_stage(report, Stage::Archive, stage_start, e))?;

        println!("Archive created: {}", summary.path.display());
        report.archive_path = Some(summary.path.display().to_string());
        report.archive_tar_sha256 = Some(summary.tar_sha256.clone());
        report.record_stage(
            Stage::Archive,
            StageStatus::Success,
            stage_start.elapsed().as_millis() as u64,
            Some(format!("{} entries", summary.entry_count)),
        );

        Ok(())
    }

    /// Run one external build tool phase (tests or assemble)
    fn run_tool_phase(
        &self,
        report: &mut PipelineReport,
        stage: Stage,
        skip: bool,
        tasks: &[String],
    ) -> PipelineResult<()> {
        if skip {
            if self.options.verbose {
                eprintln!("Skipping {} phase", stage);
            }
            report.record_stage(stage, StageStatus::Skipped, 0, None);
            return Ok(());
        }

        let stage_start = Instant::now();
        let runner = BuildRunner::new(
            self.config.build.tool.clone(),
            self.config.project_dir.clone(),
        )
        .with_verbose(self.options.verbose);

        match runner.run_tasks(tasks) {
            Ok(()) => {
                report.record_stage(
                    stage,
                    StageStatus::Success,
                    stage_start.elapsed().as_millis() as u64,
                    Some(tasks.join(" ")),
                );
                Ok(())
            }
            Err(e) => Err(self.fail_stage(report, stage, stage_start, e)),
        }
    }

    /// Record a failed stage and convert the error
    fn fail_stage<E: Into<PipelineError>>(
        &self,
        report: &mut PipelineReport,
        stage: Stage,
        stage_start: Instant,
        error: E,
    ) -> PipelineError {
        let error = error.into();
        report.record_stage(
            stage,
            StageStatus::Failed,
            stage_start.elapsed().as_millis() as u64,
            Some(error.to_string()),
        );
        error
    }

    /// Report path: pipeline_report.json next to the archive
    fn report_path(&self) -> PathBuf {
        self.config.archive_dest_dir().join("pipeline_report.json")
    }

    fn write_report(&self, report: &PipelineReport) -> PipelineResult<()> {
        let path = self.report_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = report.to_json()?;
        std::fs::write(&path, json)?;
        if self.options.verbose {
            eprintln!("Wrote: {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project_with_outputs() -> (TempDir, PackConfig) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let outputs = root.join("app/build/outputs/apk");
        fs::create_dir_all(outputs.join("free/debug")).unwrap();
        fs::create_dir_all(outputs.join("paid/release")).unwrap();
        fs::write(outputs.join("free/debug/app-free-debug.apk"), b"free").unwrap();
        fs::write(outputs.join("paid/release/app-paid-release.apk"), b"paid").unwrap();

        let mut config = PackConfig::from_toml_str("").unwrap();
        config.project_dir = root.to_path_buf();
        (dir, config)
    }

    fn skip_toolchain() -> PipelineOptions {
        PipelineOptions {
            skip_tests: true,
            skip_build: true,
            verbose: false,
        }
    }

    #[test]
    fn test_full_pipeline_without_toolchain() {
        let (dir, config) = project_with_outputs();
        let pipeline = Pipeline::new(config.clone(), skip_toolchain());

        let report = pipeline.execute().unwrap();

        assert_eq!(report.status, StageStatus::Success);
        assert_eq!(report.artifact_count, 2);
        assert_eq!(report.checksum_count, 2);
        assert!(config.archive_path().is_file());
        assert!(dir
            .path()
            .join("dist/pipeline_report.json")
            .is_file());
    }

    #[test]
    fn test_pipeline_fails_fast_on_missing_source() {
        let dir = TempDir::new().unwrap();
        let mut config = PackConfig::from_toml_str("").unwrap();
        config.project_dir = dir.path().to_path_buf();

        let pipeline = Pipeline::new(config.clone(), skip_toolchain());
        let err = pipeline.execute().unwrap_err();

        assert!(matches!(err, PipelineError::Collect(_)));
        assert_eq!(err.exit_code(), 40);
        // No archive was written
        assert!(!config.archive_path().exists());
        // But the report records the failed stage
        let report =
            PipelineReport::from_file(&dir.path().join("dist/pipeline_report.json")).unwrap();
        assert_eq!(report.status, StageStatus::Failed);
        assert!(report
            .stages
            .iter()
            .any(|s| s.stage == Stage::Collect && s.status == StageStatus::Failed));
    }

    #[test]
    fn test_rerun_overwrites_archive_with_same_tar_digest() {
        let (_dir, config) = project_with_outputs();

        let first = Pipeline::new(config.clone(), skip_toolchain())
            .execute()
            .unwrap();
        let second = Pipeline::new(config, skip_toolchain()).execute().unwrap();

        assert_eq!(first.archive_tar_sha256, second.archive_tar_sha256);
    }

    #[test]
    fn test_skipped_phases_recorded() {
        let (_dir, config) = project_with_outputs();
        let report = Pipeline::new(config, skip_toolchain()).execute().unwrap();

        assert!(report
            .stages
            .iter()
            .any(|s| s.stage == Stage::Tests && s.status == StageStatus::Skipped));
        assert!(report
            .stages
            .iter()
            .any(|s| s.stage == Stage::Assemble && s.status == StageStatus::Skipped));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_build_tool_aborts_before_collect() {
        let (dir, mut config) = project_with_outputs();
        config.build.tool = "false".to_string();

        let options = PipelineOptions {
            skip_tests: true,
            skip_build: false,
            verbose: false,
        };
        let err = Pipeline::new(config, options).execute().unwrap_err();

        assert!(matches!(err, PipelineError::Build(_)));
        assert_eq!(err.exit_code(), 30);
        // Collect never ran
        assert!(!dir.path().join("apk").exists());
    }

    #[test]
    fn test_unwritable_report_fails_a_successful_run() {
        let (dir, config) = project_with_outputs();
        // A directory squatting on the report path makes the write fail
        fs::create_dir_all(dir.path().join("dist/pipeline_report.json")).unwrap();

        let err = Pipeline::new(config.clone(), skip_toolchain())
            .execute()
            .unwrap_err();

        assert!(matches!(err, PipelineError::Io(_)));
        assert_eq!(err.exit_code(), 1);
        // The stages themselves completed
        assert!(config.archive_path().is_file());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            PipelineError::Integrity { issue_count: 1 }.exit_code(),
            70
        );
        assert_eq!(
            PipelineError::Build(BuildError::NoTasks).exit_code(),
            30
        );
    }
}
