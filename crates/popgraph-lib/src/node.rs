//! Per-node graph attributes: edge masks, traversal status and handles
//!
//! Edges are stored per colour as one byte. The low nibble holds outgoing
//! edges (bit `b` set means the k-mer formed by dropping the first base and
//! appending base `b` follows this one); the high nibble holds incoming edges
//! (bit `b` set means the k-mer formed by dropping the last base and prepending
//! base `b` precedes this one). Both are expressed in the canonical orientation
//! of the node.

use crate::kmer::Orientation;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Stable reference to a node in a [`KmerStore`](crate::store::KmerStore)
///
/// Handles are dense indices into the store's node arena and stay valid for
/// the lifetime of the store, across index growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle(pub(crate) usize);

impl NodeHandle {
    /// Arena index of this node (insertion order)
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reverse a 4-bit base mask so that bit `b` moves to bit `3 - b`
///
/// With A=0, C=1, G=2, T=3 this maps every base to its complement.
#[inline]
pub const fn complement_mask(mask: u8) -> u8 {
    ((mask & 0b0001) << 3) | ((mask & 0b0010) << 1) | ((mask & 0b0100) >> 1) | ((mask & 0b1000) >> 3)
}

/// The single base in a mask, if exactly one bit is set
#[inline]
pub const fn single_base(mask: u8) -> Option<u8> {
    if mask.count_ones() == 1 {
        Some(mask.trailing_zeros() as u8)
    } else {
        None
    }
}

/// Iterate the bases present in a 4-bit mask, in code order
pub fn bases_in_mask(mask: u8) -> impl Iterator<Item = u8> {
    (0u8..4).filter(move |b| mask & (1 << b) != 0)
}

/// Edges of one node in one colour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EdgeSet(u8);

impl EdgeSet {
    /// No edges
    pub const EMPTY: EdgeSet = EdgeSet(0);

    /// Wrap a raw edge byte (as persisted)
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw edge byte
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Outgoing base mask in canonical orientation
    #[inline]
    pub const fn outgoing(self) -> u8 {
        self.0 & 0x0F
    }

    /// Incoming base mask in canonical orientation
    #[inline]
    pub const fn incoming(self) -> u8 {
        self.0 >> 4
    }

    /// Record an outgoing edge that appends `base`
    #[inline]
    pub fn add_outgoing(&mut self, base: u8) {
        self.0 |= 1 << (base & 0b11);
    }

    /// Record an incoming edge that prepends `base`
    #[inline]
    pub fn add_incoming(&mut self, base: u8) {
        self.0 |= 1 << (4 + (base & 0b11));
    }

    /// Outgoing edges as seen when reading the node on `orientation`
    ///
    /// On the reverse strand the outgoing edges are the complemented incoming
    /// edges of the canonical k-mer.
    #[inline]
    pub const fn outgoing_in(self, orientation: Orientation) -> u8 {
        match orientation {
            Orientation::Forward => self.outgoing(),
            Orientation::Reverse => complement_mask(self.incoming()),
        }
    }

    /// Incoming edges as seen when reading the node on `orientation`
    #[inline]
    pub const fn incoming_in(self, orientation: Orientation) -> u8 {
        match orientation {
            Orientation::Forward => self.incoming(),
            Orientation::Reverse => complement_mask(self.outgoing()),
        }
    }

    /// True when the node has no edges in this colour
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EdgeSet {
    type Output = EdgeSet;

    fn bitor(self, rhs: EdgeSet) -> EdgeSet {
        EdgeSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for EdgeSet {
    fn bitor_assign(&mut self, rhs: EdgeSet) {
        self.0 |= rhs.0;
    }
}

/// Traversal and annotation status of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeStatus {
    /// Untouched in the current pass
    #[default]
    None = 0,
    /// Consumed by a walk in the current pass
    Visited = 1,
    /// Queued by a walker that has not reached it yet
    ToBeVisited = 2,
    /// Removed from consideration by a cleaning step
    Pruned = 3,
    /// Seen in the reference sequence
    ExistsInReference = 4,
    /// Seen in the reference and consumed in the current pass
    VisitedAndExistsInReference = 5,
}

impl NodeStatus {
    /// True for both visited states
    #[inline]
    pub fn is_visited(self) -> bool {
        matches!(self, NodeStatus::Visited | NodeStatus::VisitedAndExistsInReference)
    }

    /// True when the reference flag is set
    #[inline]
    pub fn in_reference(self) -> bool {
        matches!(
            self,
            NodeStatus::ExistsInReference | NodeStatus::VisitedAndExistsInReference
        )
    }

    /// True when a walk in the current pass may still consume the node
    #[inline]
    pub fn is_walkable(self) -> bool {
        matches!(self, NodeStatus::None | NodeStatus::ExistsInReference)
    }

    /// Status after a walk consumes the node
    ///
    /// Only walkable nodes change; queued, pruned and already visited nodes
    /// keep their status.
    #[inline]
    pub fn visited(self) -> NodeStatus {
        match self {
            NodeStatus::None => NodeStatus::Visited,
            NodeStatus::ExistsInReference => NodeStatus::VisitedAndExistsInReference,
            other => other,
        }
    }

    /// Status after a reference k-mer hits the node
    #[inline]
    pub fn with_reference(self) -> NodeStatus {
        if self.is_visited() {
            NodeStatus::VisitedAndExistsInReference
        } else {
            NodeStatus::ExistsInReference
        }
    }

    /// Status after the end-of-pass reset
    #[inline]
    pub fn cleared(self) -> NodeStatus {
        match self {
            NodeStatus::Visited => NodeStatus::None,
            NodeStatus::VisitedAndExistsInReference => NodeStatus::ExistsInReference,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_set_nibbles() {
        let mut edges = EdgeSet::EMPTY;
        assert!(edges.is_empty());

        edges.add_outgoing(0b10); // G
        edges.add_incoming(0b00); // A
        assert_eq!(edges.bits(), 0b0001_0100);
        assert_eq!(edges.outgoing(), 0b0100);
        assert_eq!(edges.incoming(), 0b0001);
    }

    #[test]
    fn test_complement_mask() {
        assert_eq!(complement_mask(0b0001), 0b1000); // A -> T
        assert_eq!(complement_mask(0b0010), 0b0100); // C -> G
        assert_eq!(complement_mask(0b0110), 0b0110); // {C,G} -> {G,C}
        assert_eq!(complement_mask(complement_mask(0b1011)), 0b1011);
    }

    #[test]
    fn test_oriented_edges() {
        let mut edges = EdgeSet::EMPTY;
        edges.add_outgoing(0b11); // T
        edges.add_incoming(0b01); // C

        assert_eq!(edges.outgoing_in(Orientation::Forward), 0b1000);
        assert_eq!(edges.incoming_in(Orientation::Forward), 0b0010);
        // reverse strand: out = comp(in) = {G}, in = comp(out) = {A}
        assert_eq!(edges.outgoing_in(Orientation::Reverse), 0b0100);
        assert_eq!(edges.incoming_in(Orientation::Reverse), 0b0001);
    }

    #[test]
    fn test_single_base_and_iteration() {
        assert_eq!(single_base(0b0100), Some(2));
        assert_eq!(single_base(0b0110), None);
        assert_eq!(single_base(0), None);
        assert_eq!(bases_in_mask(0b1010).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_status_transitions() {
        assert_eq!(NodeStatus::None.visited(), NodeStatus::Visited);
        assert_eq!(
            NodeStatus::ExistsInReference.visited(),
            NodeStatus::VisitedAndExistsInReference
        );
        assert_eq!(NodeStatus::Visited.cleared(), NodeStatus::None);
        assert_eq!(
            NodeStatus::VisitedAndExistsInReference.cleared(),
            NodeStatus::ExistsInReference
        );
        assert_eq!(NodeStatus::Pruned.cleared(), NodeStatus::Pruned);
        assert_eq!(NodeStatus::Visited.with_reference(), NodeStatus::VisitedAndExistsInReference);
        assert!(NodeStatus::VisitedAndExistsInReference.is_visited());
        assert!(!NodeStatus::ToBeVisited.is_visited());
    }

    #[test]
    fn test_visit_leaves_other_statuses_alone() {
        assert_eq!(NodeStatus::Pruned.visited(), NodeStatus::Pruned);
        assert_eq!(NodeStatus::ToBeVisited.visited(), NodeStatus::ToBeVisited);
        assert_eq!(NodeStatus::Visited.visited(), NodeStatus::Visited);
        assert!(NodeStatus::None.is_walkable());
        assert!(NodeStatus::ExistsInReference.is_walkable());
        assert!(!NodeStatus::Pruned.is_walkable());
        assert!(!NodeStatus::VisitedAndExistsInReference.is_walkable());
    }
}
