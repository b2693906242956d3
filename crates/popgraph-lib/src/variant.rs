//! Bubble detection and flank files
//!
//! A bubble is a fork node with exactly two outgoing edges whose branches
//! run unbranched and meet again at a common join node. Each bubble is
//! reported as a [`VariantBranchesAndFlanks`]: the unbranched path leading
//! into the fork, the two branches, and the unbranched path leaving the join.
//!
//! Variants can be written as "full flank" FASTA files (four records per
//! variant) and read back with [`FlankFileReader`], which aligns each record
//! to graph nodes.
//!
//! ```text
//! >var_0_5p_flank     CATGCAGT       k-mers of the flank, ending on the fork
//! >var_0_branch_1     AGCTT          bases appended after the 5' flank
//! >var_0_branch_2     CGCTT
//! >var_0_3p_flank     GCTTCAAT       k-mers of the flank, starting on the join
//! ```

use crate::encoding::{decode_base, EncodingError};
use crate::kmer::{Kmer, KmerBits, Orientation};
use crate::node::{bases_in_mask, single_base, NodeHandle};
use crate::reader::{open_input, FastaReader, ReadError, SequenceRecord, SequenceSource};
use crate::store::KmerStore;
use crate::traversal::{path_sequence, walk, OrientedNode};
use std::io::{self, BufRead, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors while reading variants back from a flank file
#[derive(Error, Debug)]
pub enum VariantError {
    /// The underlying FASTA stream failed
    #[error(transparent)]
    Read(#[from] ReadError),
    /// A record holds a base that cannot be part of a k-mer
    #[error("Record {record} holds an invalid k-mer: {source}")]
    InvalidKmer {
        /// Record name
        record: String,
        /// Encoding failure
        #[source]
        source: EncodingError,
    },
    /// A k-mer of the record has no node in the graph
    #[error("Record {record}: k-mer {kmer} is not in the graph")]
    KmerNotInGraph {
        /// Record name
        record: String,
        /// The missing k-mer
        kmer: String,
    },
    /// The 5' flank cannot anchor the alleles
    #[error("Record {record}: 5' flank has {len} bases, at least {min} are needed")]
    FlankTooShort {
        /// Record name
        record: String,
        /// Flank length
        len: usize,
        /// Required length (k)
        min: usize,
    },
    /// The stream ended in the middle of a variant
    #[error("Variant starting at {record} ends after {found} of 4 records")]
    Incomplete {
        /// Name of the variant's first record
        record: String,
        /// Records present
        found: usize,
    },
}

/// The four paths of one variant
///
/// Allele paths hold the nodes strictly between the fork (last node of the
/// 5' flank) and the join (first node of the 3' flank). A branch that reaches
/// the join in one step has an empty allele path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantBranchesAndFlanks {
    /// Path ending on the fork node
    pub flank_5p: Vec<OrientedNode>,
    /// Branch taken first in base order
    pub ref_allele: Vec<OrientedNode>,
    /// The other branch
    pub alt_allele: Vec<OrientedNode>,
    /// Path starting on the join node
    pub flank_3p: Vec<OrientedNode>,
}

impl VariantBranchesAndFlanks {
    /// Nodes in the 5' flank
    pub fn len_flank_5p(&self) -> usize {
        self.flank_5p.len()
    }

    /// Nodes in the reference branch
    pub fn len_ref_allele(&self) -> usize {
        self.ref_allele.len()
    }

    /// Nodes in the alternative branch
    pub fn len_alt_allele(&self) -> usize {
        self.alt_allele.len()
    }

    /// Nodes in the 3' flank
    pub fn len_flank_3p(&self) -> usize {
        self.flank_3p.len()
    }

    /// The fork node, if the 5' flank is present
    pub fn fork(&self) -> Option<OrientedNode> {
        self.flank_5p.last().copied()
    }

    /// The join node, if the 3' flank is present
    pub fn join(&self) -> Option<OrientedNode> {
        self.flank_3p.first().copied()
    }

    /// Base strings of the four records, as written to a flank file
    ///
    /// Flanks are spelled in full; alleles are the bases each branch appends
    /// to the 5' flank.
    pub fn sequences<const K: usize>(&self, store: &KmerStore<K>) -> [String; 4]
    where
        Kmer<K>: KmerBits,
    {
        [
            path_sequence(store, &self.flank_5p),
            appended_bases(store, &self.ref_allele),
            appended_bases(store, &self.alt_allele),
            path_sequence(store, &self.flank_3p),
        ]
    }
}

fn appended_bases<const K: usize>(store: &KmerStore<K>, path: &[OrientedNode]) -> String
where
    Kmer<K>: KmerBits,
{
    path.iter()
        .map(|&(h, o)| decode_base(store.key(h).oriented(o).last_base()) as char)
        .collect()
}

/// Follow one branch out of `fork` until it reaches a node with more than
/// one incoming edge
///
/// Returns the branch nodes and the join, or `None` if the branch forks,
/// dead-ends, loops back to the fork, or runs longer than `max_len` nodes.
fn follow_branch<const K: usize>(
    store: &KmerStore<K>,
    fork: OrientedNode,
    base: u8,
    colour: usize,
    max_len: usize,
) -> Option<(Vec<OrientedNode>, OrientedNode)>
where
    Kmer<K>: KmerBits,
{
    let mut nodes = Vec::new();
    let mut current = store.next_node(fork.0, fork.1, colour, base)?;
    loop {
        if current.0 == fork.0 {
            return None;
        }
        if store.in_bases(current.0, current.1, colour).count_ones() > 1 {
            return Some((nodes, current));
        }
        if nodes.len() == max_len {
            return None;
        }
        let next_base = single_base(store.out_bases(current.0, current.1, colour))?;
        nodes.push(current);
        current = store.next_node(current.0, current.1, colour, next_base)?;
    }
}

/// The bubble forking at `fork`, if its two branches meet again
fn bubble_at<const K: usize>(
    store: &KmerStore<K>,
    fork: OrientedNode,
    colour: usize,
    max_branch_length: usize,
) -> Option<VariantBranchesAndFlanks>
where
    Kmer<K>: KmerBits,
{
    let out = store.out_bases(fork.0, fork.1, colour);
    if out.count_ones() != 2 {
        return None;
    }
    let mut bases = bases_in_mask(out);
    let (first, second) = (bases.next()?, bases.next()?);

    let (ref_allele, join) = follow_branch(store, fork, first, colour, max_branch_length)?;
    let (alt_allele, alt_join) = follow_branch(store, fork, second, colour, max_branch_length)?;
    if join != alt_join {
        return None;
    }

    let (backward, _) = walk(store, (fork.0, fork.1.opposite()), colour);
    let mut flank_5p: Vec<OrientedNode> = backward
        .into_iter()
        .rev()
        .map(|(h, o)| (h, o.opposite()))
        .collect();
    flank_5p.push(fork);

    let (forward, _) = walk(store, join, colour);
    let mut flank_3p = Vec::with_capacity(forward.len() + 1);
    flank_3p.push(join);
    flank_3p.extend(forward);

    Some(VariantBranchesAndFlanks {
        flank_5p,
        ref_allele,
        alt_allele,
        flank_3p,
    })
}

/// Find every bubble of `colour` and pass it to `handler`
///
/// Nodes are tried as forks in store order, in both orientations; visited
/// nodes and nodes without edges in `colour` are skipped. Branches longer
/// than `max_branch_length` nodes are not followed. The fork and join of each
/// reported bubble are marked visited, so a pass reports each bubble once;
/// call [`KmerStore::reset_visited`] afterwards to start over.
///
/// Returns the number of variants reported, or the first handler error.
pub fn detect_bubbles<const K: usize, F, E>(
    store: &mut KmerStore<K>,
    colour: usize,
    max_branch_length: usize,
    mut handler: F,
) -> Result<usize, E>
where
    Kmer<K>: KmerBits,
    F: FnMut(&KmerStore<K>, &VariantBranchesAndFlanks) -> Result<(), E>,
{
    let mut count = 0;
    for idx in 0..store.len() {
        let handle = NodeHandle(idx);
        if !store.status(handle).is_walkable() || store.edges(handle, colour).is_empty() {
            continue;
        }
        for orientation in [Orientation::Forward, Orientation::Reverse] {
            let Some(variant) = bubble_at(store, (handle, orientation), colour, max_branch_length)
            else {
                continue;
            };
            store.mark_visited(handle);
            if let Some((join, _)) = variant.join() {
                store.mark_visited(join);
            }
            count += 1;
            handler(store, &variant)?;
            break;
        }
    }
    debug!("Colour {}: {} bubbles", colour, count);
    Ok(count)
}

/// Write one variant as four FASTA records named after `name`
pub fn write_variant<const K: usize, W: Write + ?Sized>(
    writer: &mut W,
    store: &KmerStore<K>,
    variant: &VariantBranchesAndFlanks,
    name: &str,
) -> io::Result<()>
where
    Kmer<K>: KmerBits,
{
    let [flank_5p, ref_allele, alt_allele, flank_3p] = variant.sequences(store);
    writeln!(writer, ">{name}_5p_flank\n{flank_5p}")?;
    writeln!(writer, ">{name}_branch_1\n{ref_allele}")?;
    writeln!(writer, ">{name}_branch_2\n{alt_allele}")?;
    writeln!(writer, ">{name}_3p_flank\n{flank_3p}")?;
    Ok(())
}

/// Align every k-mer of `bases` to its graph node
fn align<const K: usize>(
    store: &KmerStore<K>,
    bases: &[u8],
    record: &str,
) -> Result<Vec<OrientedNode>, VariantError>
where
    Kmer<K>: KmerBits,
{
    if bases.len() < K {
        return Ok(Vec::new());
    }
    let mut path = Vec::with_capacity(bases.len() - K + 1);
    for window in bases.windows(K) {
        let kmer = Kmer::<K>::from_ascii(window).map_err(|source| VariantError::InvalidKmer {
            record: record.to_string(),
            source,
        })?;
        let node = store.find(kmer).ok_or_else(|| VariantError::KmerNotInGraph {
            record: record.to_string(),
            kmer: kmer.to_string(),
        })?;
        path.push(node);
    }
    Ok(path)
}

/// Reader for full flank files
pub struct FlankFileReader<R> {
    fasta: FastaReader<R>,
    record: SequenceRecord,
    anchored: Vec<u8>,
}

impl<R: BufRead> FlankFileReader<R> {
    /// Wrap a buffered reader
    pub fn new(inner: R, max_read_length: usize) -> Self {
        Self {
            fasta: FastaReader::new(inner, max_read_length),
            record: SequenceRecord::with_capacity(max_read_length),
            anchored: Vec::with_capacity(max_read_length),
        }
    }
}

impl FlankFileReader<Box<dyn BufRead>> {
    /// Open a flank file, decompressing `.gz` input
    pub fn from_path<P: AsRef<Path>>(path: P, max_read_length: usize) -> io::Result<Self> {
        Ok(Self::new(open_input(path)?, max_read_length))
    }
}

impl<R: BufRead> FlankFileReader<R> {
    /// Read the next variant and align it to `store`
    ///
    /// Returns `Ok(None)` at end of input.
    pub fn read_next_variant<const K: usize>(
        &mut self,
        store: &KmerStore<K>,
    ) -> Result<Option<VariantBranchesAndFlanks>, VariantError>
    where
        Kmer<K>: KmerBits,
    {
        if self.fasta.read_next(&mut self.record)?.is_none() {
            return Ok(None);
        }
        let first = self.record.name.clone();
        if self.record.len() < K {
            return Err(VariantError::FlankTooShort {
                record: first,
                len: self.record.len(),
                min: K,
            });
        }
        let flank_5p = align(store, &self.record.bases, &first)?;

        // Alleles are anchored on the last k - 1 bases of the 5' flank
        let tail_start = self.record.len() - (K - 1);
        let tail = self.record.bases[tail_start..].to_vec();

        let mut alleles = Vec::with_capacity(2);
        for found in 1..3 {
            self.next_record(&first, found)?;
            self.anchored.clear();
            self.anchored.extend_from_slice(&tail);
            self.anchored.extend_from_slice(&self.record.bases);
            alleles.push(align(store, &self.anchored, &self.record.name)?);
        }

        self.next_record(&first, 3)?;
        let flank_3p = align(store, &self.record.bases, &self.record.name)?;

        let alt_allele = alleles.pop().unwrap_or_default();
        let ref_allele = alleles.pop().unwrap_or_default();
        Ok(Some(VariantBranchesAndFlanks {
            flank_5p,
            ref_allele,
            alt_allele,
            flank_3p,
        }))
    }

    fn next_record(&mut self, first: &str, found: usize) -> Result<(), VariantError> {
        match self.fasta.read_next(&mut self.record)? {
            Some(_) => Ok(()),
            None => Err(VariantError::Incomplete {
                record: first.to_string(),
                found,
            }),
        }
    }
}
