//! Pipeline configuration (apkpack.toml)
//!
//! Defines the configuration format and parsing for the collect/checksum/
//! archive pipeline. Defaults mirror a conventional Gradle Android layout
//! (`app/build/outputs/apk`, `./gradlew`, debug + release build types) so a
//! bare config file works out of the box.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::checksum::ChecksumAlgorithm;
use crate::collect::CollectLayout;
use crate::variant::{self, FlavorDimension, Variant};

/// Default config file path relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "apkpack.toml";

/// Error types for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Where collected artifacts come from and where they land
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputsConfig {
    /// Build toolchain output tree to scan, relative to `project_dir`
    pub source_dir: PathBuf,

    /// Package file extension to match (no leading dot)
    pub extension: String,

    /// Consolidated destination directory, relative to `project_dir`
    pub consolidated_dir: PathBuf,

    /// Destination layout: mirror source subdirectories or flatten
    pub layout: CollectLayout,
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("app/build/outputs/apk"),
            extension: "apk".to_string(),
            consolidated_dir: PathBuf::from("apk"),
            layout: CollectLayout::Mirrored,
        }
    }
}

/// Checksum configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksumConfig {
    /// Digest algorithm; also determines the sidecar file suffix
    pub algorithm: ChecksumAlgorithm,
}

/// Archive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Archive file name
    pub file_name: String,

    /// Destination directory, relative to `project_dir`
    pub dest_dir: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            file_name: "apk_bundle.tar.gz".to_string(),
            dest_dir: PathBuf::from("dist"),
        }
    }
}

/// External build tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build tool executable, relative to `project_dir` or on PATH
    pub tool: String,

    /// Tasks for the test phase
    pub test_tasks: Vec<String>,

    /// Explicit assemble tasks; when absent, one `assemble<Variant>` task is
    /// derived per enumerated variant
    pub assemble_tasks: Option<Vec<String>>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tool: "./gradlew".to_string(),
            test_tasks: vec!["test".to_string()],
            assemble_tasks: None,
        }
    }
}

/// Top-level pipeline configuration from apkpack.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Root directory all relative paths resolve against
    pub project_dir: PathBuf,

    pub outputs: OutputsConfig,

    pub checksum: ChecksumConfig,

    pub archive: ArchiveConfig,

    pub build: BuildConfig,

    /// Flavor dimensions, in declaration order
    #[serde(rename = "dimension")]
    pub dimensions: Vec<FlavorDimension>,

    /// Build types (default: debug, release)
    pub build_types: Vec<String>,
}

impl PackConfig {
    /// Load and parse config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse config from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let mut config: PackConfig = toml::from_str(s)?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    fn apply_defaults(&mut self) {
        if self.project_dir.as_os_str().is_empty() {
            self.project_dir = PathBuf::from(".");
        }
        if self.build_types.is_empty() {
            self.build_types = vec!["debug".to_string(), "release".to_string()];
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ext = &self.outputs.extension;
        if ext.is_empty() {
            return Err(ConfigError::ValidationError(
                "outputs.extension must not be empty".to_string(),
            ));
        }
        if ext.contains(['/', '\\', '.']) || ext.contains(['*', '?', '[', '{']) {
            return Err(ConfigError::ValidationError(format!(
                "outputs.extension '{}' must be a bare extension without dots, \
                 separators, or glob metacharacters",
                ext
            )));
        }

        for dimension in &self.dimensions {
            if dimension.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "dimension name must not be empty".to_string(),
                ));
            }
            if dimension.flavors.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "dimension '{}' must declare at least one flavor",
                    dimension.name
                )));
            }
        }

        if self.build_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one build type must be declared".to_string(),
            ));
        }

        if self.archive.file_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "archive.file_name must not be empty".to_string(),
            ));
        }

        if let Some(ref tasks) = self.build.assemble_tasks {
            if tasks.is_empty() {
                return Err(ConfigError::ValidationError(
                    "build.assemble_tasks must not be empty when present".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Enumerate all variants declared by this configuration
    pub fn variants(&self) -> Vec<Variant> {
        variant::enumerate(&self.dimensions, &self.build_types)
    }

    /// Assemble tasks to run: the explicit override, or one derived
    /// `assemble<Variant>` task per variant
    pub fn assemble_tasks(&self) -> Vec<String> {
        match &self.build.assemble_tasks {
            Some(tasks) => tasks.clone(),
            None => self.variants().iter().map(|v| v.assemble_task()).collect(),
        }
    }

    /// Source directory resolved against `project_dir`
    pub fn source_dir(&self) -> PathBuf {
        self.project_dir.join(&self.outputs.source_dir)
    }

    /// Consolidated directory resolved against `project_dir`
    pub fn consolidated_dir(&self) -> PathBuf {
        self.project_dir.join(&self.outputs.consolidated_dir)
    }

    /// Archive destination directory resolved against `project_dir`
    pub fn archive_dest_dir(&self) -> PathBuf {
        self.project_dir.join(&self.archive.dest_dir)
    }

    /// Full archive path resolved against `project_dir`
    pub fn archive_path(&self) -> PathBuf {
        self.archive_dest_dir().join(&self.archive.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
project_dir = "."

[outputs]
source_dir = "app/build/outputs/apk"
extension = "apk"
consolidated_dir = "apk"
layout = "mirrored"

[checksum]
algorithm = "sha256"

[archive]
file_name = "apk_bundle.tar.gz"
dest_dir = "dist"

[build]
tool = "./gradlew"
test_tasks = ["test"]

[[dimension]]
name = "paidMode"
flavors = ["free", "paid"]

[[dimension]]
name = "minSdk"
flavors = ["minSdk21", "minSdk30"]

build_types = ["debug", "release"]
"#;

    #[test]
    fn test_parse_full_config() {
        let config = PackConfig::from_toml_str(FULL_CONFIG).unwrap();
        assert_eq!(config.outputs.extension, "apk");
        assert_eq!(config.dimensions.len(), 2);
        assert_eq!(config.build_types, vec!["debug", "release"]);
        assert_eq!(config.variants().len(), 8);
    }

    #[test]
    fn test_empty_config_gets_defaults() {
        let config = PackConfig::from_toml_str("").unwrap();
        assert_eq!(
            config.outputs.source_dir,
            PathBuf::from("app/build/outputs/apk")
        );
        assert_eq!(config.build.tool, "./gradlew");
        assert_eq!(config.build_types, vec!["debug", "release"]);
        assert_eq!(config.archive.file_name, "apk_bundle.tar.gz");
    }

    #[test]
    fn test_derived_assemble_tasks() {
        let config = PackConfig::from_toml_str(FULL_CONFIG).unwrap();
        let tasks = config.assemble_tasks();
        assert_eq!(tasks.len(), 8);
        assert!(tasks.contains(&"assembleFreeMinSdk21Debug".to_string()));
        assert!(tasks.contains(&"assemblePaidMinSdk30Release".to_string()));
    }

    #[test]
    fn test_assemble_tasks_override() {
        let toml = r#"
[build]
assemble_tasks = ["assembleDebug", "assembleRelease"]
"#;
        let config = PackConfig::from_toml_str(toml).unwrap();
        assert_eq!(
            config.assemble_tasks(),
            vec!["assembleDebug", "assembleRelease"]
        );
    }

    #[test]
    fn test_default_assemble_tasks_without_dimensions() {
        let config = PackConfig::from_toml_str("").unwrap();
        assert_eq!(
            config.assemble_tasks(),
            vec!["assembleDebug", "assembleRelease"]
        );
    }

    #[test]
    fn test_rejects_empty_extension() {
        let toml = r#"
[outputs]
extension = ""
"#;
        let err = PackConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_rejects_extension_with_dot() {
        let toml = r#"
[outputs]
extension = ".apk"
"#;
        assert!(PackConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_extension_with_glob() {
        let toml = r#"
[outputs]
extension = "a*k"
"#;
        assert!(PackConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_empty_dimension() {
        let toml = r#"
[[dimension]]
name = "paidMode"
flavors = []
"#;
        let err = PackConfig::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("paidMode"));
    }

    #[test]
    fn test_rejects_empty_build_types_list() {
        // An explicitly empty list is replaced by the default, so exercise
        // the validator directly
        let mut config = PackConfig::default();
        config.apply_defaults();
        config.build_types.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_path_resolution() {
        let toml = r#"
project_dir = "/work/proj"
"#;
        let config = PackConfig::from_toml_str(toml).unwrap();
        assert_eq!(
            config.source_dir(),
            PathBuf::from("/work/proj/app/build/outputs/apk")
        );
        assert_eq!(
            config.archive_path(),
            PathBuf::from("/work/proj/dist/apk_bundle.tar.gz")
        );
    }
}
