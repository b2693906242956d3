//! Loading whole populations from list files
//!
//! A population list has one line per person: the path of a file that in
//! turn lists that person's sequence (or binary) files, one per line. Person
//! `i` (counting non-blank lines) is loaded into colour `i`. Relative paths
//! are resolved against the directory of the list that names them.
//!
//! ```text
//! population.list        person0.list
//! ---------------        ------------
//! person0.list           reads_0_a.fa
//! person1.list           reads_0_b.fa.gz
//! ```

use crate::builder::ingest::{GraphBuilder, LoadStats};
use crate::kmer::{Kmer, KmerBits};
use anyhow::{bail, Context, Result};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::info;

/// Kind of file named in a person's list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// FASTA reads
    Fasta,
    /// FASTQ reads
    Fastq,
    /// Single-colour graph binaries
    Binary,
}

/// Parse a list of paths, skipping blank lines
///
/// Relative entries are resolved against the list file's directory.
pub fn read_path_list<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open list file: {}", path.display()))?;
    let reader = BufReader::new(file);
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let mut paths = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| {
            format!("Failed to read line {} of {}", line_num + 1, path.display())
        })?;
        let entry = line.trim();
        if entry.is_empty() {
            continue;
        }
        let entry = Path::new(entry);
        if entry.is_absolute() {
            paths.push(entry.to_path_buf());
        } else {
            paths.push(base.join(entry));
        }
    }
    Ok(paths)
}

/// Load every file named in `list` into `colour`
pub fn load_person_files<const K: usize, P: AsRef<Path>>(
    builder: &mut GraphBuilder<'_, K>,
    list: P,
    colour: usize,
    format: FileFormat,
) -> Result<LoadStats>
where
    Kmer<K>: KmerBits,
{
    let list = list.as_ref();
    let files = read_path_list(list)?;
    let mut stats = LoadStats::default();

    for file in &files {
        stats += match format {
            FileFormat::Fasta => builder.load_fasta_file(file, colour)?,
            FileFormat::Fastq => builder.load_fastq_file(file, colour)?,
            FileFormat::Binary => builder.load_binary_file(file, colour)?,
        };
    }

    info!(
        "Colour {}: {} files from {}, {} bases, {} bad reads, {} duplicates",
        colour,
        files.len(),
        list.display(),
        stats.bases_loaded,
        stats.bad_reads,
        stats.duplicate_reads
    );
    Ok(stats)
}

/// Load a population list, person `i` into colour `i`
///
/// Fails if the list names more people than the store has colours.
pub fn load_population<const K: usize, P: AsRef<Path>>(
    builder: &mut GraphBuilder<'_, K>,
    population_list: P,
    format: FileFormat,
) -> Result<LoadStats>
where
    Kmer<K>: KmerBits,
{
    let population_list = population_list.as_ref();
    let people = read_path_list(population_list)?;
    let num_colours = builder.store().num_colours();
    if people.len() > num_colours {
        bail!(
            "{} lists {} people but the graph has only {} colours",
            population_list.display(),
            people.len(),
            num_colours
        );
    }

    let mut total = LoadStats::default();
    for (colour, person) in people.iter().enumerate() {
        total += load_person_files(builder, person, colour, format)?;
    }
    builder.report(&total);
    Ok(total)
}

/// Load a population whose people list FASTA files
pub fn load_population_as_fasta<const K: usize, P: AsRef<Path>>(
    builder: &mut GraphBuilder<'_, K>,
    population_list: P,
) -> Result<LoadStats>
where
    Kmer<K>: KmerBits,
{
    load_population(builder, population_list, FileFormat::Fasta)
}

/// Load a population whose people list FASTQ files
pub fn load_population_as_fastq<const K: usize, P: AsRef<Path>>(
    builder: &mut GraphBuilder<'_, K>,
    population_list: P,
) -> Result<LoadStats>
where
    Kmer<K>: KmerBits,
{
    load_population(builder, population_list, FileFormat::Fastq)
}

/// Load a population whose people list single-colour binaries
pub fn load_population_as_binaries<const K: usize, P: AsRef<Path>>(
    builder: &mut GraphBuilder<'_, K>,
    population_list: P,
) -> Result<LoadStats>
where
    Kmer<K>: KmerBits,
{
    load_population(builder, population_list, FileFormat::Binary)
}
