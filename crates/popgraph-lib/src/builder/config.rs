//! Graph construction configuration
//!
//! Parameters shared by every loader: k-mer length, number of colours, read
//! buffer sizing and the base filters applied while cutting windows.

use crate::constants::{
    is_valid_k, DEFAULT_EXPECTED_KMERS, DEFAULT_MAX_READ_LENGTH, DEFAULT_NUM_COLOURS, DEFAULT_SEED,
    MAX_COLOURS, MAX_K, MIN_K,
};
use crate::window::WindowConfig;
use thiserror::Error;

/// Invalid configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// k outside the supported range
    #[error("k must be in range [{min}, {max}], got k={0}", min = MIN_K, max = MAX_K)]
    InvalidK(usize),
    /// Colour count outside `1..=MAX_COLOURS`
    #[error("num_colours must be in range [1, {max}], got {0}", max = MAX_COLOURS)]
    InvalidColourCount(usize),
    /// Maximum read length too short to hold a single k-mer
    #[error("max_read_length must be at least k, got max_read_length={max_read_length}, k={k}")]
    InvalidReadLength {
        /// Configured maximum read length
        max_read_length: usize,
        /// Configured k
        k: usize,
    },
    /// Homopolymer breaking with a zero-length run
    #[error("homopolymer_cutoff must be positive")]
    InvalidHomopolymerCutoff,
    /// Colour index beyond the configured colour count
    #[error("colour {colour} out of range, the graph has {num_colours} colours")]
    ColourOutOfRange {
        /// Requested colour
        colour: usize,
        /// Colours available
        num_colours: usize,
    },
}

/// Configuration parameters for building a graph
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// K-mer length (between 3 and 63)
    pub k: usize,

    /// Number of colours (individuals or populations)
    pub num_colours: usize,

    /// Longest record the readers accept
    pub max_read_length: usize,

    /// Initial capacity of the k-mer table
    pub expected_kmers: usize,

    /// Minimum Phred quality for FASTQ bases (0 = no filtering)
    pub quality_cutoff: u8,

    /// Break windows after this many copies of the same base
    pub homopolymer_cutoff: Option<usize>,

    /// Drop reads whose k-mer content was already seen in the same colour
    pub remove_duplicates: bool,

    /// Seed for the read fingerprint hash
    pub seed: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            k: 31,
            num_colours: DEFAULT_NUM_COLOURS,
            max_read_length: DEFAULT_MAX_READ_LENGTH,
            expected_kmers: DEFAULT_EXPECTED_KMERS,
            quality_cutoff: 0,
            homopolymer_cutoff: None,
            remove_duplicates: false,
            seed: DEFAULT_SEED,
        }
    }
}

impl GraphConfig {
    /// Create a validated configuration with the given k and colour count
    pub fn new(k: usize, num_colours: usize) -> Result<Self, ConfigError> {
        let config = Self {
            k,
            num_colours,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_k(self.k) {
            return Err(ConfigError::InvalidK(self.k));
        }
        if self.num_colours == 0 || self.num_colours > MAX_COLOURS {
            return Err(ConfigError::InvalidColourCount(self.num_colours));
        }
        if self.max_read_length < self.k {
            return Err(ConfigError::InvalidReadLength {
                max_read_length: self.max_read_length,
                k: self.k,
            });
        }
        if self.homopolymer_cutoff == Some(0) {
            return Err(ConfigError::InvalidHomopolymerCutoff);
        }
        Ok(())
    }

    /// Check that `colour` addresses one of the configured colours
    pub fn check_colour(&self, colour: usize) -> Result<(), ConfigError> {
        if colour >= self.num_colours {
            return Err(ConfigError::ColourOutOfRange {
                colour,
                num_colours: self.num_colours,
            });
        }
        Ok(())
    }

    /// Base filters for window extraction
    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            quality_cutoff: self.quality_cutoff,
            homopolymer_cutoff: self.homopolymer_cutoff,
        }
    }

    /// Log configuration parameters via tracing
    pub fn print(&self) {
        tracing::info!("Graph Configuration:");
        tracing::info!("  k = {}", self.k);
        tracing::info!("  num_colours = {}", self.num_colours);
        tracing::debug!("  max_read_length = {}", self.max_read_length);
        tracing::debug!("  expected_kmers = {}", self.expected_kmers);
        if self.quality_cutoff > 0 {
            tracing::info!("  quality_cutoff = {}", self.quality_cutoff);
        }
        match self.homopolymer_cutoff {
            Some(cutoff) => tracing::info!("  homopolymer_cutoff = {}", cutoff),
            None => tracing::debug!("  homopolymer breaking off"),
        }
        tracing::info!("  remove_duplicates = {}", self.remove_duplicates);
        tracing::debug!("  seed = {}", self.seed);
    }
}
