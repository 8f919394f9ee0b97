//! External build tool invocation
//!
//! Runs the configured build tool (a Gradle wrapper by default) for the test
//! and assemble phases. The toolchain's own output is the error surface; no
//! parsing beyond the exit status.

use std::io;
use std::path::PathBuf;
use std::process::Command;

/// Errors for build tool invocations
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to spawn build tool '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("Build tool exited with {status} running: {tasks}")]
    TasksFailed { status: String, tasks: String },

    #[error("No tasks to run")]
    NoTasks,
}

/// Runs build tool tasks in the project directory
pub struct BuildRunner {
    tool: String,
    project_dir: PathBuf,
    verbose: bool,
}

impl BuildRunner {
    pub fn new(tool: String, project_dir: PathBuf) -> Self {
        Self {
            tool,
            project_dir,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the given tasks in a single tool invocation
    ///
    /// The tool inherits stdout/stderr so its progress and errors reach the
    /// console directly. A non-zero exit status is fatal.
    pub fn run_tasks(&self, tasks: &[String]) -> Result<(), BuildError> {
        if tasks.is_empty() {
            return Err(BuildError::NoTasks);
        }

        if self.verbose {
            eprintln!("Running: {} {}", self.tool, tasks.join(" "));
        }

        let status = Command::new(&self.tool)
            .args(tasks)
            .current_dir(&self.project_dir)
            .status()
            .map_err(|source| BuildError::Spawn {
                tool: self.tool.clone(),
                source,
            })?;

        if !status.success() {
            return Err(BuildError::TasksFailed {
                status: status.to_string(),
                tasks: tasks.join(" "),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_task_list_rejected() {
        let dir = TempDir::new().unwrap();
        let runner = BuildRunner::new("true".to_string(), dir.path().to_path_buf());
        assert!(matches!(runner.run_tasks(&[]), Err(BuildError::NoTasks)));
    }

    #[test]
    fn test_missing_tool_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let runner = BuildRunner::new(
            "./definitely-not-a-real-tool".to_string(),
            dir.path().to_path_buf(),
        );
        let err = runner.run_tasks(&["test".to_string()]).unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_invocation() {
        let dir = TempDir::new().unwrap();
        let runner = BuildRunner::new("true".to_string(), dir.path().to_path_buf());
        runner.run_tasks(&["test".to_string()]).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_invocation() {
        let dir = TempDir::new().unwrap();
        let runner = BuildRunner::new("false".to_string(), dir.path().to_path_buf());
        let err = runner
            .run_tasks(&["assembleDebug".to_string()])
            .unwrap_err();
        assert!(matches!(err, BuildError::TasksFailed { tasks, .. } if tasks == "assembleDebug"));
    }
}
