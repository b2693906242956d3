//! Flagging graph nodes that occur in a reference sequence
//!
//! Reference files are read as FASTA records (typically chromosomes split
//! into fixed-size chunks) and cut into windows with no quality or
//! homopolymer filtering. Nodes already in the graph get the reference flag;
//! reference k-mers absent from the graph are not inserted.

use crate::kmer::{Kmer, KmerBits};
use crate::reader::{FastaReader, ReadError, SequenceRecord, SequenceSource};
use crate::store::KmerStore;
use crate::window::{extract_windows, WindowConfig, WindowSet};
use anyhow::{Context, Result};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Counters for a reference pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceStats {
    /// Reference bases read
    pub bases_read: u64,
    /// Reference records without a usable k-mer or malformed
    pub bad_records: u64,
    /// Reference k-mers examined
    pub kmers_seen: u64,
    /// Reference k-mers found in the graph
    pub kmers_marked: u64,
}

impl AddAssign for ReferenceStats {
    fn add_assign(&mut self, other: Self) {
        self.bases_read += other.bases_read;
        self.bad_records += other.bad_records;
        self.kmers_seen += other.kmers_seen;
        self.kmers_marked += other.kmers_marked;
    }
}

/// Flag every graph node whose k-mer occurs in `source`
pub fn mark_reference<const K: usize, S: SequenceSource + ?Sized>(
    store: &mut KmerStore<K>,
    source: &mut S,
    max_read_length: usize,
) -> Result<ReferenceStats, ReadError>
where
    Kmer<K>: KmerBits,
{
    let mut stats = ReferenceStats::default();
    let mut record = SequenceRecord::with_capacity(max_read_length);
    let mut windows = WindowSet::<K>::for_read_length(max_read_length);
    let config = WindowConfig::default();

    loop {
        match source.read_next(&mut record) {
            Ok(None) => break,
            Ok(Some(len)) => {
                stats.bases_read += len as u64;
                match extract_windows(&record.bases, &[], &config, &mut windows) {
                    Ok(0) => stats.bad_records += 1,
                    Ok(_) => {
                        for &kmer in windows.kmers() {
                            stats.kmers_seen += 1;
                            if let Some((handle, _)) = store.find(kmer) {
                                store.mark_in_reference(handle);
                                stats.kmers_marked += 1;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Skipping reference record {}: {}", record.name, e);
                        stats.bad_records += 1;
                    }
                }
            }
            Err(e) if e.is_recoverable() => {
                warn!("Skipping malformed reference record: {}", e);
                stats.bad_records += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(stats)
}

/// Mark the graph with one reference FASTA file
pub fn mark_reference_file<const K: usize, P: AsRef<Path>>(
    store: &mut KmerStore<K>,
    path: P,
    max_read_length: usize,
) -> Result<ReferenceStats>
where
    Kmer<K>: KmerBits,
{
    let path = path.as_ref();
    let mut source = FastaReader::from_path(path, max_read_length)
        .with_context(|| format!("Failed to open reference file: {}", path.display()))?;
    let stats = mark_reference(store, &mut source, max_read_length)
        .with_context(|| format!("Failed to read reference file: {}", path.display()))?;
    debug!(
        "{}: {} of {} k-mers in graph",
        path.display(),
        stats.kmers_marked,
        stats.kmers_seen
    );
    Ok(stats)
}

/// Mark the graph with every file in `paths`, in order
pub fn mark_reference_files<const K: usize>(
    store: &mut KmerStore<K>,
    paths: &[PathBuf],
    max_read_length: usize,
) -> Result<ReferenceStats>
where
    Kmer<K>: KmerBits,
{
    let mut total = ReferenceStats::default();
    for path in paths {
        total += mark_reference_file(store, path, max_read_length)?;
        info!("Marked reference {}", path.display());
    }
    info!(
        "Reference: {} bases, {} of {} k-mers found in graph",
        total.bases_read, total.kmers_marked, total.kmers_seen
    );
    Ok(total)
}
