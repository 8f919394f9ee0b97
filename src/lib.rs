//! apkpack - collect, checksum, and archive per-variant build outputs
//!
//! This crate post-processes the package outputs of an external build
//! toolchain: it copies every matching package file into one consolidated
//! directory, writes a digest sidecar per artifact, verifies the pairing,
//! and bundles the result into a single compressed archive. A sequential
//! pipeline runner ties the stages to the toolchain's test and assemble
//! phases.

pub mod archive;
pub mod build;
pub mod checksum;
pub mod collect;
pub mod config;
pub mod pipeline;
pub mod report;
pub mod variant;
pub mod verify;

pub use config::{ConfigError, PackConfig};
pub use pipeline::{Pipeline, PipelineError, PipelineOptions, PipelineResult};
