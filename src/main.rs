//! apkpack CLI
//!
//! Entry point for the `apkpack` command-line tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use apkpack::archive::Archiver;
use apkpack::checksum;
use apkpack::collect::Collector;
use apkpack::config::{PackConfig, DEFAULT_CONFIG_PATH};
use apkpack::verify;
use apkpack::{Pipeline, PipelineError, PipelineOptions};

#[derive(Parser)]
#[command(name = "apkpack")]
#[command(about = "Collect, checksum, and archive per-variant build outputs", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: tests, assemble, collect, checksum, verify, archive
    Run {
        /// Path to config file (default: apkpack.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Skip the test phase
        #[arg(long)]
        skip_tests: bool,

        /// Skip the assemble phase
        #[arg(long)]
        skip_build: bool,

        /// Verbose diagnostics
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Copy matching build outputs into the consolidated directory
    Collect {
        /// Path to config file (default: apkpack.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Write one digest sidecar per collected artifact
    Checksum {
        /// Path to config file (default: apkpack.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Verify checksum pairing and digests in the consolidated directory
    Verify {
        /// Path to config file (default: apkpack.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Bundle the consolidated directory into the archive
    Archive {
        /// Path to config file (default: apkpack.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Validate the config file and print the effective configuration
    Validate {
        /// Path to config file (default: apkpack.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            skip_tests,
            skip_build,
            verbose,
        } => run_pipeline(config, skip_tests, skip_build, verbose),
        Commands::Collect { config } => run_collect(config),
        Commands::Checksum { config } => run_checksum(config),
        Commands::Verify { config } => run_verify(config),
        Commands::Archive { config } => run_archive(config),
        Commands::Validate { config } => run_validate(config),
    }
}

fn load_config(config_path: Option<PathBuf>) -> PackConfig {
    let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    match PackConfig::from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    }
}

fn exit_with(err: PipelineError) -> ! {
    eprintln!("Error: {}", err);
    process::exit(err.exit_code());
}

fn run_pipeline(config_path: Option<PathBuf>, skip_tests: bool, skip_build: bool, verbose: bool) {
    let config = load_config(config_path);
    let options = PipelineOptions {
        skip_tests,
        skip_build,
        verbose,
    };

    match Pipeline::new(config, options).execute() {
        Ok(report) => {
            println!("{}", report.human_summary);
        }
        Err(e) => exit_with(e),
    }
}

fn run_collect(config_path: Option<PathBuf>) {
    let config = load_config(config_path);

    let collector = match Collector::new(
        config.source_dir(),
        config.consolidated_dir(),
        &config.outputs.extension,
        config.outputs.layout,
    ) {
        Ok(c) => c,
        Err(e) => exit_with(PipelineError::Collect(e)),
    };

    match collector.collect() {
        Ok(result) => {
            for artifact in &result.artifacts {
                println!("Collected: {}", artifact.rel_path.display());
            }
            println!(
                "Collected {} artifact(s) into: {}",
                result.artifacts.len(),
                result.dest_dir.display()
            );
        }
        Err(e) => exit_with(PipelineError::Collect(e)),
    }
}

fn run_checksum(config_path: Option<PathBuf>) {
    let config = load_config(config_path);

    match checksum::checksum_tree(
        &config.consolidated_dir(),
        &config.outputs.extension,
        config.checksum.algorithm,
    ) {
        Ok(records) => {
            for record in &records {
                println!("Checksum written: {}", record.sidecar.display());
            }
            println!("Wrote {} checksum(s)", records.len());
        }
        Err(e) => exit_with(PipelineError::Checksum(e)),
    }
}

fn run_verify(config_path: Option<PathBuf>) {
    let config = load_config(config_path);

    match verify::verify_tree(
        &config.consolidated_dir(),
        &config.outputs.extension,
        config.checksum.algorithm,
    ) {
        Ok(report) => {
            if report.passed() {
                println!(
                    "Verified {} artifact(s) with {} checksum(s)",
                    report.artifact_count, report.checksum_count
                );
            } else {
                for issue in &report.issues {
                    eprintln!("Integrity issue: {}", issue.describe());
                }
                exit_with(PipelineError::Integrity {
                    issue_count: report.issues.len(),
                });
            }
        }
        Err(e) => exit_with(PipelineError::Verify(e)),
    }
}

fn run_archive(config_path: Option<PathBuf>) {
    let config = load_config(config_path);

    let archiver = Archiver::new(config.consolidated_dir(), config.archive_path());
    match archiver.create() {
        Ok(summary) => {
            println!(
                "Archive created: {} ({} entries, {} bytes)",
                summary.path.display(),
                summary.entry_count,
                summary.compressed_bytes
            );
        }
        Err(e) => exit_with(PipelineError::Archive(e)),
    }
}

fn run_validate(config_path: Option<PathBuf>) {
    let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    match PackConfig::from_file(&path) {
        Ok(config) => {
            println!("Configuration valid: {}", path.display());
            println!();
            println!("  Source dir: {}", config.source_dir().display());
            println!("  Extension: {}", config.outputs.extension);
            println!(
                "  Consolidated dir: {}",
                config.consolidated_dir().display()
            );
            println!("  Checksum: {}", config.checksum.algorithm);
            println!("  Archive: {}", config.archive_path().display());
            println!("  Build tool: {}", config.build.tool);

            let variants = config.variants();
            println!("  Variants ({}):", variants.len());
            for variant in &variants {
                println!("    {}", variant);
            }
        }
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    }
}
