//! Supernode traversal
//!
//! A supernode is a maximal path, within one colour, along which every step
//! leaves a node with exactly one outgoing edge and enters a node with exactly
//! one incoming edge. Walking a colour partitions the nodes that have edges in
//! it into supernodes; each node is consumed once per pass and marked visited.
//!
//! Seeds are taken in store insertion order. Each supernode is reported on the
//! strand whose base string is lexicographically smaller, so the output does
//! not depend on which of its nodes happened to seed the walk.

use crate::encoding::{decode_base, reverse_complement_str};
use crate::kmer::{Kmer, KmerBits, Orientation};
use crate::node::{single_base, NodeHandle};
use crate::store::KmerStore;
use tracing::debug;

/// A node read on a given strand
pub type OrientedNode = (NodeHandle, Orientation);

/// An ordered path of oriented nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supernode {
    nodes: Vec<OrientedNode>,
    is_cycle: bool,
}

impl Supernode {
    /// Nodes in path order
    pub fn nodes(&self) -> &[OrientedNode] {
        &self.nodes
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True for an empty path
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when the walk closed back on its seed
    pub fn is_cycle(&self) -> bool {
        self.is_cycle
    }

    /// Whether `handle` is on the path (in either orientation)
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.iter().any(|&(h, _)| h == handle)
    }

    /// Base string spelled by the path: `len() + k - 1` bases
    pub fn sequence<const K: usize>(&self, store: &KmerStore<K>) -> String
    where
        Kmer<K>: KmerBits,
    {
        path_sequence(store, &self.nodes)
    }

    /// The same path read on the opposite strand
    pub fn reverse(&mut self) {
        self.nodes.reverse();
        for node in self.nodes.iter_mut() {
            node.1 = node.1.opposite();
        }
    }
}

/// Base string spelled by a path of overlapping oriented nodes
pub fn path_sequence<const K: usize>(store: &KmerStore<K>, path: &[OrientedNode]) -> String
where
    Kmer<K>: KmerBits,
{
    let Some(&(first, first_orientation)) = path.first() else {
        return String::new();
    };
    let mut seq = store.key(first).oriented(first_orientation).to_string();
    seq.reserve(path.len() - 1);
    for &(handle, orientation) in &path[1..] {
        let last = store.key(handle).oriented(orientation).last_base();
        seq.push(decode_base(last) as char);
    }
    seq
}

/// Counters for a traversal pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Supernodes emitted
    pub supernodes: usize,
    /// Nodes consumed
    pub nodes_visited: usize,
    /// Supernodes that close on themselves
    pub cycles: usize,
    /// Longest supernode, in nodes
    pub longest: usize,
}

/// Successor of `current` along an unbranched stretch, if there is one
///
/// The step exists when `current` has exactly one outgoing edge in `colour`
/// and the node it reaches has exactly one incoming edge.
pub(crate) fn unique_successor<const K: usize>(
    store: &KmerStore<K>,
    current: OrientedNode,
    colour: usize,
) -> Option<OrientedNode>
where
    Kmer<K>: KmerBits,
{
    let (handle, orientation) = current;
    let base = single_base(store.out_bases(handle, orientation, colour))?;
    let next = store.next_node(handle, orientation, colour, base)?;
    single_base(store.in_bases(next.0, next.1, colour))?;
    Some(next)
}

/// Walk from `start` while the path is unbranched
///
/// Returns the nodes after `start` and whether the walk came back to `start`.
pub(crate) fn walk<const K: usize>(
    store: &KmerStore<K>,
    start: OrientedNode,
    colour: usize,
) -> (Vec<OrientedNode>, bool)
where
    Kmer<K>: KmerBits,
{
    let mut path = Vec::new();
    let mut current = start;
    while let Some(next) = unique_successor(store, current, colour) {
        if next == start {
            return (path, true);
        }
        path.push(next);
        current = next;
    }
    (path, false)
}

/// The supernode through `seed` in `colour`, without touching node status
pub fn supernode_containing<const K: usize>(
    store: &KmerStore<K>,
    seed: NodeHandle,
    colour: usize,
) -> Supernode
where
    Kmer<K>: KmerBits,
{
    let start = (seed, Orientation::Forward);
    let (forward, is_cycle) = walk(store, start, colour);

    let mut nodes = Vec::with_capacity(forward.len() + 1);
    if !is_cycle {
        let (backward, _) = walk(store, (seed, Orientation::Reverse), colour);
        nodes.extend(backward.into_iter().rev().map(|(h, o)| (h, o.opposite())));
    }
    nodes.push(start);
    nodes.extend(forward);

    let mut supernode = Supernode { nodes, is_cycle };
    let seq = supernode.sequence(store);
    if reverse_complement_str(&seq) < seq {
        supernode.reverse();
    }
    supernode
}

/// Walk every supernode of `colour`, passing each one to `handler`
///
/// Nodes already visited in this pass, queued or pruned nodes, and nodes
/// without edges in `colour` are not used as seeds. Every node of an emitted supernode is marked
/// visited before the handler runs; call
/// [`KmerStore::reset_visited`] before starting an independent pass.
/// The first handler error stops the walk and is returned.
pub fn traverse_supernodes<const K: usize, F, E>(
    store: &mut KmerStore<K>,
    colour: usize,
    mut handler: F,
) -> Result<TraversalStats, E>
where
    Kmer<K>: KmerBits,
    F: FnMut(&KmerStore<K>, &Supernode) -> Result<(), E>,
{
    let mut stats = TraversalStats::default();

    for idx in 0..store.len() {
        let seed = NodeHandle(idx);
        if !store.status(seed).is_walkable() || store.edges(seed, colour).is_empty() {
            continue;
        }

        let supernode = supernode_containing(store, seed, colour);
        for &(handle, _) in supernode.nodes() {
            // a path may cross the same node on both strands
            if store.mark_visited(handle) {
                stats.nodes_visited += 1;
            }
        }

        stats.supernodes += 1;
        stats.longest = stats.longest.max(supernode.len());
        if supernode.is_cycle() {
            stats.cycles += 1;
        }

        handler(store, &supernode)?;
    }

    debug!(
        "Colour {}: {} supernodes over {} nodes ({} cycles, longest {})",
        colour, stats.supernodes, stats.nodes_visited, stats.cycles, stats.longest
    );
    Ok(stats)
}

/// Collect the sequences of every supernode of `colour` in traversal order
///
/// Leaves the visited flags cleared afterwards.
pub fn supernode_sequences<const K: usize>(store: &mut KmerStore<K>, colour: usize) -> Vec<String>
where
    Kmer<K>: KmerBits,
{
    let mut sequences = Vec::new();
    let result: Result<_, std::convert::Infallible> =
        traverse_supernodes(store, colour, |store, supernode| {
            sequences.push(supernode.sequence(store));
            Ok(())
        });
    if let Err(never) = result {
        match never {}
    }
    store.reset_visited();
    sequences
}
