//! Loading reads and binaries into a [`KmerStore`]
//!
//! Each record is cut into windows; every k-mer of a window is inserted with
//! one unit of coverage in the target colour, and consecutive k-mers inside a
//! window are joined by an edge in that colour.

use crate::builder::config::{ConfigError, GraphConfig};
use crate::hasher::DeterministicHasher;
use crate::kmer::{Kmer, KmerBits, Orientation};
use crate::node::NodeHandle;
use crate::reader::{
    open_sequence_file, FastaReader, FastqReader, ReadError, SequenceFormat, SequenceRecord,
    SequenceSource,
};
use crate::store::KmerStore;
use crate::window::{extract_windows, WindowConfig, WindowError, WindowSet};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::BufRead;
use std::ops::AddAssign;
use std::path::Path;
use tracing::{debug, info, warn};

/// Counters accumulated while loading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Bases read (record lengths; k per node for binaries)
    pub bases_loaded: u64,
    /// Records read, including skipped ones
    pub records_read: u64,
    /// Records skipped as malformed or without a usable k-mer
    pub bad_reads: u64,
    /// Records skipped as duplicates
    pub duplicate_reads: u64,
    /// K-mer occurrences inserted (nodes read, for binaries)
    pub kmers_loaded: u64,
}

impl AddAssign for LoadStats {
    fn add_assign(&mut self, other: Self) {
        self.bases_loaded += other.bases_loaded;
        self.records_read += other.records_read;
        self.bad_reads += other.bad_reads;
        self.duplicate_reads += other.duplicate_reads;
        self.kmers_loaded += other.kmers_loaded;
    }
}

/// What happened to a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Inserted with this many k-mers
    Loaded(usize),
    /// No usable k-mer
    Bad,
    /// Same k-mer content already loaded into this colour
    Duplicate,
}

/// Loads sequence data into a store
pub struct GraphBuilder<'a, const K: usize>
where
    Kmer<K>: KmerBits,
{
    store: &'a mut KmerStore<K>,
    window_config: WindowConfig,
    max_read_length: usize,
    remove_duplicates: bool,
    hasher: DeterministicHasher,
    fingerprints: Vec<HashSet<u64, DeterministicHasher>>,
    windows: WindowSet<K>,
}

impl<'a, const K: usize> GraphBuilder<'a, K>
where
    Kmer<K>: KmerBits,
{
    /// Create a builder writing into `store`
    ///
    /// Fails if the configuration is invalid or disagrees with the store's
    /// k or colour count.
    pub fn new(store: &'a mut KmerStore<K>, config: &GraphConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.k != K {
            return Err(ConfigError::InvalidK(config.k));
        }
        if config.num_colours != store.num_colours() {
            return Err(ConfigError::InvalidColourCount(config.num_colours));
        }

        let hasher = DeterministicHasher::new(config.seed);
        let fingerprints = (0..config.num_colours)
            .map(|_| HashSet::with_hasher(hasher.clone()))
            .collect();

        Ok(Self {
            store,
            window_config: config.window_config(),
            max_read_length: config.max_read_length,
            remove_duplicates: config.remove_duplicates,
            hasher,
            fingerprints,
            windows: WindowSet::for_read_length(config.max_read_length),
        })
    }

    /// The store being built
    pub fn store(&self) -> &KmerStore<K> {
        self.store
    }

    fn check_colour(&self, colour: usize) -> Result<(), ConfigError> {
        if colour >= self.store.num_colours() {
            return Err(ConfigError::ColourOutOfRange {
                colour,
                num_colours: self.store.num_colours(),
            });
        }
        Ok(())
    }

    /// Insert one record into `colour`
    ///
    /// # Panics
    /// If `colour` is not below the store's colour count.
    pub fn load_record(
        &mut self,
        bases: &[u8],
        qualities: &[u8],
        colour: usize,
    ) -> Result<RecordOutcome, WindowError> {
        let nkmers = extract_windows(bases, qualities, &self.window_config, &mut self.windows)?;
        if nkmers == 0 {
            return Ok(RecordOutcome::Bad);
        }

        if self.remove_duplicates {
            let fingerprint = self.read_fingerprint();
            if !self.fingerprints[colour].insert(fingerprint) {
                return Ok(RecordOutcome::Duplicate);
            }
        }

        for w in 0..self.windows.num_windows() {
            let mut previous: Option<(NodeHandle, Orientation)> = None;
            for &kmer in self.windows.window(w) {
                let (handle, orientation, _) = self.store.find_or_insert(kmer);
                self.store.increment_coverage(handle, colour, 1);
                if let Some((prev_handle, prev_orientation)) = previous {
                    self.store
                        .add_edge(prev_handle, handle, prev_orientation, orientation, colour);
                }
                previous = Some((handle, orientation));
            }
        }
        Ok(RecordOutcome::Loaded(nkmers))
    }

    /// Strand-independent hash of the current windows' canonical k-mers
    fn read_fingerprint(&self) -> u64 {
        let kmers = self.windows.kmers();
        let forward = self
            .hasher
            .hash_sequence(kmers.iter().map(|k| k.canonical().as_u128()));
        let backward = self
            .hasher
            .hash_sequence(kmers.iter().rev().map(|k| k.canonical().as_u128()));
        forward.min(backward)
    }

    /// Load every record of `source` into `colour`
    ///
    /// Malformed records are skipped and counted as bad reads; I/O errors
    /// stop the load.
    pub fn load_sequences<S: SequenceSource + ?Sized>(
        &mut self,
        source: &mut S,
        colour: usize,
    ) -> Result<LoadStats, ReadError> {
        assert!(
            colour < self.store.num_colours(),
            "colour {} out of range",
            colour
        );
        let mut stats = LoadStats::default();
        let mut record = SequenceRecord::with_capacity(self.max_read_length);

        loop {
            match source.read_next(&mut record) {
                Ok(None) => break,
                Ok(Some(len)) => {
                    stats.records_read += 1;
                    stats.bases_loaded += len as u64;
                    match self.load_record(&record.bases, &record.qualities, colour) {
                        Ok(RecordOutcome::Loaded(n)) => stats.kmers_loaded += n as u64,
                        Ok(RecordOutcome::Bad) => stats.bad_reads += 1,
                        Ok(RecordOutcome::Duplicate) => stats.duplicate_reads += 1,
                        Err(e) => {
                            warn!("Skipping read {}: {}", record.name, e);
                            stats.bad_reads += 1;
                        }
                    }
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping malformed record: {}", e);
                    stats.records_read += 1;
                    stats.bad_reads += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(stats)
    }

    /// Load FASTA records from a buffered reader into `colour`
    pub fn load_fasta<R: BufRead>(&mut self, reader: R, colour: usize) -> Result<LoadStats, ReadError> {
        let mut source = FastaReader::new(reader, self.max_read_length);
        self.load_sequences(&mut source, colour)
    }

    /// Load FASTQ records from a buffered reader into `colour`
    pub fn load_fastq<R: BufRead>(&mut self, reader: R, colour: usize) -> Result<LoadStats, ReadError> {
        let mut source = FastqReader::new(reader, self.max_read_length);
        self.load_sequences(&mut source, colour)
    }

    /// Load a FASTA file (optionally gzipped) into `colour`
    pub fn load_fasta_file<P: AsRef<Path>>(&mut self, path: P, colour: usize) -> Result<LoadStats> {
        self.load_file(path.as_ref(), SequenceFormat::Fasta, colour)
    }

    /// Load a FASTQ file (optionally gzipped) into `colour`
    pub fn load_fastq_file<P: AsRef<Path>>(&mut self, path: P, colour: usize) -> Result<LoadStats> {
        self.load_file(path.as_ref(), SequenceFormat::Fastq, colour)
    }

    fn load_file(&mut self, path: &Path, format: SequenceFormat, colour: usize) -> Result<LoadStats> {
        self.check_colour(colour)?;
        let kind = match format {
            SequenceFormat::Fasta => "FASTA",
            SequenceFormat::Fastq => "FASTQ",
        };
        let mut source = open_sequence_file(path, format, self.max_read_length)
            .with_context(|| format!("Failed to open {} file: {}", kind, path.display()))?;
        let stats = self
            .load_sequences(&mut source, colour)
            .with_context(|| format!("Failed to read {} file: {}", kind, path.display()))?;
        debug!(
            "{}: {} records, {} bases, {} bad, {} duplicates",
            path.display(),
            stats.records_read,
            stats.bases_loaded,
            stats.bad_reads,
            stats.duplicate_reads
        );
        Ok(stats)
    }

    /// Merge a single-colour binary into `colour`
    ///
    /// Counts k bases per node read.
    pub fn load_binary_file<P: AsRef<Path>>(&mut self, path: P, colour: usize) -> Result<LoadStats> {
        let path = path.as_ref();
        self.check_colour(colour)?;
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open binary file: {}", path.display()))?;
        let mut reader = std::io::BufReader::new(file);
        let nodes = self
            .store
            .load_into_colour(&mut reader, colour)
            .with_context(|| format!("Failed to load binary file: {}", path.display()))?;
        debug!("{}: {} nodes", path.display(), nodes);
        Ok(LoadStats {
            bases_loaded: nodes * K as u64,
            kmers_loaded: nodes,
            ..LoadStats::default()
        })
    }

    /// Log a summary of `stats` and the store size
    pub fn report(&self, stats: &LoadStats) {
        info!(
            "Loaded {} bases from {} records ({} bad, {} duplicates); {} distinct k-mers",
            stats.bases_loaded,
            stats.records_read,
            stats.bad_reads,
            stats.duplicate_reads,
            self.store.len()
        );
    }
}
