//! Builder module for populating a multi-colour graph
//!
//! This module implements the build phase:
//! 1. Validate the configuration
//! 2. Read FASTA/FASTQ records (or single-colour binaries)
//! 3. Cut records into windows of valid k-mers
//! 4. Insert k-mers with coverage and per-colour edges
//! 5. Optionally flag nodes present in a reference

pub mod config;
pub mod ingest;
pub mod population;
pub mod reference;

pub use config::{ConfigError, GraphConfig};
pub use ingest::{GraphBuilder, LoadStats, RecordOutcome};
pub use population::{
    load_person_files, load_population, load_population_as_binaries, load_population_as_fasta,
    load_population_as_fastq, read_path_list, FileFormat,
};
pub use reference::{mark_reference, mark_reference_file, mark_reference_files, ReferenceStats};
