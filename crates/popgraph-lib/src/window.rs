//! Splitting a read into windows of contiguous valid k-mers
//!
//! A window is a maximal run of bases that are A/C/G/T, pass the quality
//! cutoff and are not cut by homopolymer breaking, holding every overlapping
//! k-mer of that run. Consecutive k-mers inside a window become graph edges;
//! no edge crosses a window boundary.

use crate::constants::{max_kmers, max_windows, PHRED_OFFSET};
use crate::encoding::try_encode_base;
use crate::kmer::{Kmer, KmerBits};
use thiserror::Error;

/// Error type for window extraction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// The read produced more windows than the set can hold
    #[error("Too many windows: the limit is {max}")]
    TooManyWindows {
        /// Window capacity
        max: usize,
    },
    /// The read produced more k-mers than the set can hold
    #[error("Too many k-mers: the limit is {max}")]
    TooManyKmers {
        /// K-mer capacity
        max: usize,
    },
}

/// Base filtering applied while cutting windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowConfig {
    /// Minimum Phred quality (offset 33); 0 disables the check
    pub quality_cutoff: u8,
    /// Longest homopolymer run kept intact; later copies of the base break the window
    pub homopolymer_cutoff: Option<usize>,
}

/// Reusable output buffer for [`extract_windows`]
pub struct WindowSet<const K: usize>
where
    Kmer<K>: KmerBits,
{
    kmers: Vec<Kmer<K>>,
    starts: Vec<usize>,
    max_windows: usize,
    max_kmers: usize,
}

impl<const K: usize> WindowSet<K>
where
    Kmer<K>: KmerBits,
{
    /// Create a set holding at most `max_windows` windows and `max_kmers` k-mers
    pub fn with_capacity(max_windows: usize, max_kmers: usize) -> Self {
        Self {
            kmers: Vec::with_capacity(max_kmers),
            starts: Vec::with_capacity(max_windows),
            max_windows,
            max_kmers,
        }
    }

    /// Create a set large enough for any read of `max_read_length` bases
    pub fn for_read_length(max_read_length: usize) -> Self {
        Self::with_capacity(
            max_windows(max_read_length, K),
            max_kmers(max_read_length, K),
        )
    }

    /// Drop all windows, keeping allocations
    pub fn clear(&mut self) {
        self.kmers.clear();
        self.starts.clear();
    }

    /// Number of windows
    pub fn num_windows(&self) -> usize {
        self.starts.len()
    }

    /// Total number of k-mers across all windows
    pub fn num_kmers(&self) -> usize {
        self.kmers.len()
    }

    /// True if there are no windows
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// K-mers of window `i`, in read order
    pub fn window(&self, i: usize) -> &[Kmer<K>] {
        let end = self.starts.get(i + 1).copied().unwrap_or(self.kmers.len());
        &self.kmers[self.starts[i]..end]
    }

    /// All windows in read order
    pub fn iter(&self) -> impl Iterator<Item = &[Kmer<K>]> + '_ {
        (0..self.starts.len()).map(move |i| self.window(i))
    }

    /// Every k-mer of every window, in read order
    pub fn kmers(&self) -> &[Kmer<K>] {
        &self.kmers
    }

    fn open_window(&mut self) -> Result<(), WindowError> {
        if self.starts.len() == self.max_windows {
            return Err(WindowError::TooManyWindows {
                max: self.max_windows,
            });
        }
        self.starts.push(self.kmers.len());
        Ok(())
    }

    fn push(&mut self, kmer: Kmer<K>) -> Result<(), WindowError> {
        if self.kmers.len() == self.max_kmers {
            return Err(WindowError::TooManyKmers {
                max: self.max_kmers,
            });
        }
        self.kmers.push(kmer);
        Ok(())
    }
}

/// Cut `bases` into windows of valid k-mers, replacing the contents of `windows`
///
/// `qualities` is either empty (FASTA) or as long as `bases`. Returns the
/// total number of k-mers; 0 means the read has no usable k-mer.
pub fn extract_windows<const K: usize>(
    bases: &[u8],
    qualities: &[u8],
    config: &WindowConfig,
    windows: &mut WindowSet<K>,
) -> Result<usize, WindowError>
where
    Kmer<K>: KmerBits,
{
    windows.clear();

    let mut kmer = Kmer::<K>::default();
    let mut run = 0usize;
    let mut homopolymer_base = None;
    let mut homopolymer_run = 0usize;

    for (i, &base) in bases.iter().enumerate() {
        let code = try_encode_base(base);

        match code {
            Some(c) if homopolymer_base == Some(c) => homopolymer_run += 1,
            Some(c) => {
                homopolymer_base = Some(c);
                homopolymer_run = 1;
            }
            None => {
                homopolymer_base = None;
                homopolymer_run = 0;
            }
        }

        let quality_ok = config.quality_cutoff == 0
            || qualities
                .get(i)
                .is_none_or(|&q| q.saturating_sub(PHRED_OFFSET) >= config.quality_cutoff);
        let homopolymer_ok = config
            .homopolymer_cutoff
            .is_none_or(|cutoff| homopolymer_run <= cutoff);

        match code {
            Some(c) if quality_ok && homopolymer_ok => {
                kmer = kmer.append_base(c);
                run += 1;
                if run == K {
                    windows.open_window()?;
                }
                if run >= K {
                    windows.push(kmer)?;
                }
            }
            _ => run = 0,
        }
    }

    Ok(windows.num_kmers())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings<const K: usize>(set: &WindowSet<K>) -> Vec<Vec<String>>
    where
        Kmer<K>: KmerBits,
    {
        set.iter()
            .map(|w| w.iter().map(|k| k.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_breaks_at_ambiguous_base() {
        let mut set = WindowSet::<4>::for_read_length(9);
        let n = extract_windows(b"ACGTNACGT", b"", &WindowConfig::default(), &mut set).unwrap();
        assert_eq!(n, 2);
        assert_eq!(strings(&set), vec![vec!["ACGT"], vec!["ACGT"]]);
    }

    #[test]
    fn test_perfect_read_is_one_window() {
        let mut set = WindowSet::<3>::for_read_length(10);
        let n = extract_windows(b"aacgtt", b"", &WindowConfig::default(), &mut set).unwrap();
        assert_eq!(n, 4);
        assert_eq!(set.num_windows(), 1);
        assert_eq!(strings(&set), vec![vec!["AAC", "ACG", "CGT", "GTT"]]);
    }

    #[test]
    fn test_short_runs_are_dropped() {
        let mut set = WindowSet::<5>::for_read_length(20);
        let n = extract_windows(b"ACGNACGTANNCC", b"", &WindowConfig::default(), &mut set).unwrap();
        assert_eq!(n, 1);
        assert_eq!(strings(&set), vec![vec!["ACGTA"]]);

        let n = extract_windows(b"ACNNT", b"", &WindowConfig::default(), &mut set).unwrap();
        assert_eq!(n, 0);
        assert!(set.is_empty());
    }

    #[test]
    fn test_quality_cutoff() {
        let config = WindowConfig {
            quality_cutoff: 20,
            homopolymer_cutoff: None,
        };
        let mut set = WindowSet::<3>::for_read_length(8);
        // '#' is Phred 2, 'I' is Phred 40
        let n = extract_windows(b"ACGTACGT", b"IIII#III", &config, &mut set).unwrap();
        assert_eq!(n, 3);
        assert_eq!(strings(&set), vec![vec!["ACG", "CGT"], vec!["CGT"]]);

        // Without qualities the cutoff has nothing to act on
        let n = extract_windows(b"ACGTACGT", b"", &config, &mut set).unwrap();
        assert_eq!(n, 6);
    }

    #[test]
    fn test_homopolymer_breaking() {
        let config = WindowConfig {
            quality_cutoff: 0,
            homopolymer_cutoff: Some(3),
        };
        let mut set = WindowSet::<3>::for_read_length(10);
        let n = extract_windows(b"AAAAACGG", b"", &config, &mut set).unwrap();
        // AAA kept, the 4th and 5th A break, then CGG restarts
        assert_eq!(strings(&set), vec![vec!["AAA"], vec!["CGG"]]);
        assert_eq!(n, 2);
    }

    #[test]
    fn test_set_is_reset_between_reads() {
        let mut set = WindowSet::<3>::for_read_length(10);
        extract_windows(b"ACGTACG", b"", &WindowConfig::default(), &mut set).unwrap();
        assert_eq!(set.num_kmers(), 5);
        extract_windows(b"TTT", b"", &WindowConfig::default(), &mut set).unwrap();
        assert_eq!(strings(&set), vec![vec!["TTT"]]);
    }

    #[test]
    fn test_capacity_errors() {
        let mut set = WindowSet::<3>::with_capacity(1, 100);
        assert_eq!(
            extract_windows(b"AAANCCC", b"", &WindowConfig::default(), &mut set),
            Err(WindowError::TooManyWindows { max: 1 })
        );

        let mut set = WindowSet::<3>::with_capacity(10, 2);
        assert_eq!(
            extract_windows(b"ACGTA", b"", &WindowConfig::default(), &mut set),
            Err(WindowError::TooManyKmers { max: 2 })
        );
    }

    #[test]
    fn test_worst_case_fits_computed_capacity() {
        // k good bases separated by single Ns, as densely as possible
        let read = b"ACGTNACGTNACGTNACGT";
        let mut set = WindowSet::<4>::for_read_length(read.len());
        assert_eq!(
            extract_windows(read, b"", &WindowConfig::default(), &mut set).unwrap(),
            4
        );
        assert_eq!(set.num_windows(), 4);
    }
}
