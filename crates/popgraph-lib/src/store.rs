//! The k-mer store: one node per canonical k-mer, with per-colour edges,
//! coverage and a traversal status
//!
//! Nodes live in a flat arena addressed by [`NodeHandle`]. Per-colour data is
//! laid out row-major (`handle * num_colours + colour`) so all colours of a node
//! share a cache line for small colour counts. A separate hash index maps
//! canonical keys to arena slots; growing the index never moves a node.

use crate::constants::{DEFAULT_EXPECTED_KMERS, MAX_COLOURS};
use crate::encoding::complement_base;
use crate::hasher::DeterministicHasher;
use crate::kmer::{Kmer, KmerBits, Orientation};
use crate::node::{EdgeSet, NodeHandle, NodeStatus};
use std::collections::HashMap;

/// Multi-colour de Bruijn graph keyed by canonical k-mers
pub struct KmerStore<const K: usize>
where
    Kmer<K>: KmerBits,
{
    num_colours: usize,
    keys: Vec<Kmer<K>>,
    edges: Vec<EdgeSet>,
    coverage: Vec<u32>,
    status: Vec<NodeStatus>,
    index: HashMap<Kmer<K>, usize, DeterministicHasher>,
}

impl<const K: usize> KmerStore<K>
where
    Kmer<K>: KmerBits,
{
    /// Create an empty store with the default initial capacity
    ///
    /// # Panics
    /// If `num_colours` is 0 or above [`MAX_COLOURS`].
    pub fn new(num_colours: usize) -> Self {
        Self::with_capacity(num_colours, DEFAULT_EXPECTED_KMERS)
    }

    /// Create an empty store sized for `expected_kmers` distinct k-mers
    ///
    /// # Panics
    /// If `num_colours` is 0 or above [`MAX_COLOURS`].
    pub fn with_capacity(num_colours: usize, expected_kmers: usize) -> Self {
        assert!(
            (1..=MAX_COLOURS).contains(&num_colours),
            "num_colours must be in 1..={}, got {}",
            MAX_COLOURS,
            num_colours
        );
        Self {
            num_colours,
            keys: Vec::with_capacity(expected_kmers),
            edges: Vec::with_capacity(expected_kmers * num_colours),
            coverage: Vec::with_capacity(expected_kmers * num_colours),
            status: Vec::with_capacity(expected_kmers),
            index: HashMap::with_capacity_and_hasher(expected_kmers, DeterministicHasher::default()),
        }
    }

    /// Number of distinct canonical k-mers
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if no k-mer has been inserted
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// K-mer length
    #[inline]
    pub const fn k(&self) -> usize {
        K
    }

    /// Number of colours this store was created with
    #[inline]
    pub fn num_colours(&self) -> usize {
        self.num_colours
    }

    #[inline]
    fn slot(&self, handle: NodeHandle, colour: usize) -> usize {
        debug_assert!(colour < self.num_colours, "colour {} out of range", colour);
        handle.0 * self.num_colours + colour
    }

    /// Look up a k-mer in either orientation, inserting its canonical form if absent
    ///
    /// Returns the node, the orientation of `kmer` relative to the stored key,
    /// and whether the node was created by this call. New nodes start with no
    /// edges, zero coverage and status `None`.
    pub fn find_or_insert(&mut self, kmer: Kmer<K>) -> (NodeHandle, Orientation, bool) {
        let (canonical, orientation) = kmer.canonical_with_orientation();
        if let Some(&idx) = self.index.get(&canonical) {
            return (NodeHandle(idx), orientation, false);
        }

        let idx = self.keys.len();
        self.keys.push(canonical);
        self.edges.extend(std::iter::repeat(EdgeSet::EMPTY).take(self.num_colours));
        self.coverage.extend(std::iter::repeat(0u32).take(self.num_colours));
        self.status.push(NodeStatus::None);
        self.index.insert(canonical, idx);
        (NodeHandle(idx), orientation, true)
    }

    /// Look up a k-mer in either orientation without modifying the store
    pub fn find(&self, kmer: Kmer<K>) -> Option<(NodeHandle, Orientation)> {
        let (canonical, orientation) = kmer.canonical_with_orientation();
        self.index
            .get(&canonical)
            .map(|&idx| (NodeHandle(idx), orientation))
    }

    /// Canonical key of a node
    #[inline]
    pub fn key(&self, handle: NodeHandle) -> Kmer<K> {
        self.keys[handle.0]
    }

    /// Record the edge `from -> to` in `colour`
    ///
    /// `from` read on `from_orientation` must overlap `to` read on
    /// `to_orientation` by k-1 bases. The outgoing bit lands on `from` and the
    /// matching incoming bit on `to`, each in its node's canonical frame.
    pub fn add_edge(
        &mut self,
        from: NodeHandle,
        to: NodeHandle,
        from_orientation: Orientation,
        to_orientation: Orientation,
        colour: usize,
    ) {
        let appended = self.key(to).oriented(to_orientation).last_base();
        let dropped = self.key(from).oriented(from_orientation).first_base();

        let from_slot = self.slot(from, colour);
        match from_orientation {
            Orientation::Forward => self.edges[from_slot].add_outgoing(appended),
            Orientation::Reverse => self.edges[from_slot].add_incoming(complement_base(appended)),
        }

        let to_slot = self.slot(to, colour);
        match to_orientation {
            Orientation::Forward => self.edges[to_slot].add_incoming(dropped),
            Orientation::Reverse => self.edges[to_slot].add_outgoing(complement_base(dropped)),
        }
    }

    /// Merge `edges` into a node's edge set for `colour`
    pub fn set_edges(&mut self, handle: NodeHandle, colour: usize, edges: EdgeSet) {
        let slot = self.slot(handle, colour);
        self.edges[slot] |= edges;
    }

    /// Edge set of a node in `colour`
    #[inline]
    pub fn edges(&self, handle: NodeHandle, colour: usize) -> EdgeSet {
        self.edges[self.slot(handle, colour)]
    }

    /// Add `delta` to a node's coverage in `colour`, saturating at `u32::MAX`
    pub fn increment_coverage(&mut self, handle: NodeHandle, colour: usize, delta: u32) {
        let slot = self.slot(handle, colour);
        self.coverage[slot] = self.coverage[slot].saturating_add(delta);
    }

    /// Coverage of a node in `colour`
    #[inline]
    pub fn coverage(&self, handle: NodeHandle, colour: usize) -> u32 {
        self.coverage[self.slot(handle, colour)]
    }

    /// Current status of a node
    #[inline]
    pub fn status(&self, handle: NodeHandle) -> NodeStatus {
        self.status[handle.0]
    }

    /// Overwrite a node's status
    #[inline]
    pub fn set_status(&mut self, handle: NodeHandle, status: NodeStatus) {
        self.status[handle.0] = status;
    }

    /// Mark a node as consumed by the current traversal pass
    ///
    /// `None` becomes `Visited` and `ExistsInReference` becomes
    /// `VisitedAndExistsInReference`. Any other status is kept. Returns
    /// whether the status changed.
    #[inline]
    pub fn mark_visited(&mut self, handle: NodeHandle) -> bool {
        let status = &mut self.status[handle.0];
        let next = status.visited();
        let changed = next != *status;
        *status = next;
        changed
    }

    /// Flag a node as present in the reference, keeping its visited state
    #[inline]
    pub fn mark_in_reference(&mut self, handle: NodeHandle) {
        let status = &mut self.status[handle.0];
        *status = status.with_reference();
    }

    /// Reset every node whose status matches `predicate` to `None`
    ///
    /// Returns the number of nodes changed.
    pub fn reset_statuses<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(NodeStatus) -> bool,
    {
        let mut changed = 0;
        for status in self.status.iter_mut() {
            if *status != NodeStatus::None && predicate(*status) {
                *status = NodeStatus::None;
                changed += 1;
            }
        }
        changed
    }

    /// End-of-pass reset: drop the visited flag and keep reference membership
    ///
    /// Returns the number of nodes changed.
    pub fn reset_visited(&mut self) -> usize {
        let mut changed = 0;
        for status in self.status.iter_mut() {
            let cleared = status.cleared();
            if cleared != *status {
                *status = cleared;
                changed += 1;
            }
        }
        changed
    }

    /// Bases that can be appended to the node read on `orientation`, as a mask
    #[inline]
    pub fn out_bases(&self, handle: NodeHandle, orientation: Orientation, colour: usize) -> u8 {
        self.edges(handle, colour).outgoing_in(orientation)
    }

    /// Bases that can be prepended to the node read on `orientation`, as a mask
    #[inline]
    pub fn in_bases(&self, handle: NodeHandle, orientation: Orientation, colour: usize) -> u8 {
        self.edges(handle, colour).incoming_in(orientation)
    }

    /// Follow the outgoing edge with `base` from the node read on `orientation`
    ///
    /// Returns `None` if the edge is absent in `colour` or its target is not
    /// in the store.
    pub fn next_node(
        &self,
        handle: NodeHandle,
        orientation: Orientation,
        colour: usize,
        base: u8,
    ) -> Option<(NodeHandle, Orientation)> {
        if self.out_bases(handle, orientation, colour) & (1 << (base & 0b11)) == 0 {
            return None;
        }
        let next = self.key(handle).oriented(orientation).append_base(base);
        self.find(next)
    }

    /// Whether the node was observed in `colour`
    #[inline]
    pub fn is_in_colour(&self, handle: NodeHandle, colour: usize) -> bool {
        let slot = self.slot(handle, colour);
        !self.edges[slot].is_empty() || self.coverage[slot] > 0
    }

    /// Sum of a node's coverage over all colours
    pub fn total_coverage(&self, handle: NodeHandle) -> u64 {
        let start = handle.0 * self.num_colours;
        self.coverage[start..start + self.num_colours]
            .iter()
            .map(|&c| c as u64)
            .sum()
    }

    /// All node handles in insertion order
    pub fn handles(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        (0..self.keys.len()).map(NodeHandle)
    }

    /// All nodes with their canonical keys, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, Kmer<K>)> + '_ {
        self.keys
            .iter()
            .enumerate()
            .map(|(idx, &kmer)| (NodeHandle(idx), kmer))
    }

    /// Number of nodes observed in `colour`
    pub fn count_in_colour(&self, colour: usize) -> usize {
        self.handles().filter(|&h| self.is_in_colour(h, colour)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::single_base;

    fn kmer<const K: usize>(s: &str) -> Kmer<K>
    where
        Kmer<K>: KmerBits,
    {
        Kmer::from_str(s).unwrap()
    }

    #[test]
    fn test_find_or_insert_is_idempotent() {
        let mut store = KmerStore::<5>::new(2);
        assert!(store.is_empty());

        let (h1, o1, new1) = store.find_or_insert(kmer("AACGT"));
        assert!(new1);
        assert_eq!(o1, Orientation::Forward);
        assert_eq!(store.len(), 1);

        // Reverse complement hits the same node
        let (h2, o2, new2) = store.find_or_insert(kmer("ACGTT"));
        assert!(!new2);
        assert_eq!(h1, h2);
        assert_eq!(o2, Orientation::Reverse);
        assert_eq!(store.len(), 1);

        let (h3, _, new3) = store.find_or_insert(kmer("CCCCC"));
        assert!(new3);
        assert_ne!(h1, h3);
        assert_eq!(store.len(), 2);
        assert_eq!(store.status(h3), NodeStatus::None);
        assert_eq!(store.coverage(h3, 1), 0);
    }

    #[test]
    fn test_find_is_read_only() {
        let mut store = KmerStore::<3>::new(1);
        assert_eq!(store.find(kmer("ACA")), None);
        let (h, _, _) = store.find_or_insert(kmer("TGT"));
        assert_eq!(store.find(kmer("ACA")), Some((h, Orientation::Forward)));
        assert_eq!(store.find(kmer("TGT")), Some((h, Orientation::Reverse)));
        assert_eq!(store.key(h).to_string(), "ACA");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_edge_is_reciprocal() {
        let mut store = KmerStore::<3>::new(1);
        // AAC -> ACG: AAC canonical forward, ACG canonical forward
        let (a, oa, _) = store.find_or_insert(kmer("AAC"));
        let (b, ob, _) = store.find_or_insert(kmer("ACG"));
        store.add_edge(a, b, oa, ob, 0);

        assert_eq!(store.out_bases(a, oa, 0), 1 << 2); // G
        assert_eq!(store.in_bases(b, ob, 0), 1 << 0); // A
        assert_eq!(store.next_node(a, oa, 0, 2), Some((b, ob)));
    }

    #[test]
    fn test_add_edge_across_strands() {
        let mut store = KmerStore::<3>::new(1);
        // CGT (rc ACG, stored reverse) -> GTT (rc AAC, stored reverse)
        let (a, oa, _) = store.find_or_insert(kmer("CGT"));
        let (b, ob, _) = store.find_or_insert(kmer("GTT"));
        assert_eq!(oa, Orientation::Reverse);
        assert_eq!(ob, Orientation::Reverse);
        store.add_edge(a, b, oa, ob, 0);

        // Canonical frames: ACG gains incoming A, AAC gains outgoing G
        assert_eq!(store.edges(a, 0).incoming(), 1 << 0);
        assert_eq!(store.edges(b, 0).outgoing(), 1 << 2);

        // Walking forward from CGT appends T and lands on GTT
        assert_eq!(single_base(store.out_bases(a, oa, 0)), Some(3));
        assert_eq!(store.next_node(a, oa, 0, 3), Some((b, ob)));
        // Walking backward from AAC (forward) reaches ACG
        assert_eq!(store.next_node(b, Orientation::Forward, 0, 2), Some((a, Orientation::Forward)));
    }

    #[test]
    fn test_colours_are_isolated() {
        let mut store = KmerStore::<3>::new(3);
        let (a, oa, _) = store.find_or_insert(kmer("AAC"));
        let (b, ob, _) = store.find_or_insert(kmer("ACG"));
        store.add_edge(a, b, oa, ob, 1);
        store.increment_coverage(a, 1, 4);

        assert!(store.edges(a, 0).is_empty());
        assert!(!store.edges(a, 1).is_empty());
        assert!(store.edges(a, 2).is_empty());
        assert_eq!(store.coverage(a, 1), 4);
        assert_eq!(store.coverage(a, 0), 0);
        assert!(store.is_in_colour(a, 1));
        assert!(!store.is_in_colour(a, 2));
        assert_eq!(store.next_node(a, oa, 0, 2), None);
        assert_eq!(store.count_in_colour(1), 2);
        assert_eq!(store.total_coverage(a), 4);
    }

    #[test]
    fn test_coverage_saturates() {
        let mut store = KmerStore::<3>::new(1);
        let (h, _, _) = store.find_or_insert(kmer("AAA"));
        store.increment_coverage(h, 0, u32::MAX - 1);
        store.increment_coverage(h, 0, 5);
        assert_eq!(store.coverage(h, 0), u32::MAX);
    }

    #[test]
    fn test_set_edges_merges() {
        let mut store = KmerStore::<3>::new(1);
        let (h, _, _) = store.find_or_insert(kmer("AAA"));
        store.set_edges(h, 0, EdgeSet::from_bits(0b0000_0001));
        store.set_edges(h, 0, EdgeSet::from_bits(0b0001_0000));
        assert_eq!(store.edges(h, 0).bits(), 0b0001_0001);
    }

    #[test]
    fn test_status_reset() {
        let mut store = KmerStore::<3>::new(1);
        let (a, _, _) = store.find_or_insert(kmer("AAA"));
        let (b, _, _) = store.find_or_insert(kmer("CCC"));
        let (c, _, _) = store.find_or_insert(kmer("AAC"));

        store.mark_in_reference(b);
        store.mark_visited(a);
        store.mark_visited(b);
        store.set_status(c, NodeStatus::Pruned);
        assert!(!store.mark_visited(a));
        assert!(!store.mark_visited(c));
        assert_eq!(store.status(a), NodeStatus::Visited);
        assert_eq!(store.status(b), NodeStatus::VisitedAndExistsInReference);

        assert_eq!(store.reset_visited(), 2);
        assert_eq!(store.status(a), NodeStatus::None);
        assert_eq!(store.status(b), NodeStatus::ExistsInReference);
        assert_eq!(store.status(c), NodeStatus::Pruned);

        assert_eq!(store.reset_statuses(|s| s == NodeStatus::Pruned), 1);
        assert_eq!(store.status(c), NodeStatus::None);
    }

    #[test]
    fn test_iteration_in_insertion_order() {
        let mut store = KmerStore::<4>::with_capacity(1, 4);
        for s in ["TTTT", "ACGT", "CCAA"] {
            store.find_or_insert(kmer(s));
        }
        let keys: Vec<String> = store.iter().map(|(_, k)| k.to_string()).collect();
        assert_eq!(keys, vec!["AAAA", "ACGT", "CCAA"]);
        let handles: Vec<usize> = store.handles().map(|h| h.index()).collect();
        assert_eq!(handles, vec![0, 1, 2]);
    }

    #[test]
    fn test_large_k_store() {
        let mut store = KmerStore::<41>::new(1);
        let s = "ACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTA";
        let (h, _, _) = store.find_or_insert(kmer(s));
        let (h2, _, new) = store.find_or_insert(kmer::<41>(s).reverse_complement());
        assert_eq!(h, h2);
        assert!(!new);
        assert_eq!(store.k(), 41);
    }

    #[test]
    #[should_panic]
    fn test_zero_colours_rejected() {
        let _ = KmerStore::<3>::new(0);
    }
}
