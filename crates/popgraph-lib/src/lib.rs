//! popgraph: a multi-colour de Bruijn graph over DNA k-mers
//!
//! Reads from several individuals are loaded into one shared graph, each
//! individual in its own colour. Every canonical k-mer is a node carrying
//! per-colour edges and coverage. Once built, the graph is walked per colour
//! to extract supernodes (maximal unbranched paths) and variant bubbles.
//!
//! The k-mer length is a const generic; use [`dispatch_on_k!`] to go from a
//! runtime `k` to the matching [`KmerStore`].
//!
//! ```
//! use popgraph_lib::{GraphBuilder, GraphConfig, KmerStore, supernode_sequences};
//!
//! let config = GraphConfig::new(3, 1).unwrap();
//! let mut store = KmerStore::<3>::new(1);
//! let mut builder = GraphBuilder::new(&mut store, &config).unwrap();
//! builder.load_fasta(&b">read\nAACGTT\n"[..], 0).unwrap();
//!
//! assert_eq!(supernode_sequences(&mut store, 0), vec!["AACGTT"]);
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod constants;
pub mod encoding;
pub mod hasher;
pub mod kmer;
pub mod node;
pub mod reader;
pub mod serialization;
pub mod store;
pub mod traversal;
pub mod variant;
pub mod window;

// Re-export common types at crate root
pub use builder::{ConfigError, GraphBuilder, GraphConfig, LoadStats};
pub use kmer::{Kmer, KmerBits, Orientation};
pub use node::{EdgeSet, NodeHandle, NodeStatus};
pub use reader::{FastaReader, FastqReader, ReadError, SequenceRecord, SequenceSource};
pub use serialization::SerializationError;
pub use store::KmerStore;
pub use traversal::{supernode_sequences, traverse_supernodes, Supernode, TraversalStats};
pub use variant::{detect_bubbles, FlankFileReader, VariantBranchesAndFlanks, VariantError};

/// Version information
pub fn version() -> (u8, u8, u8) {
    constants::VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let (major, minor, patch) = version();
        assert_eq!(major, 0);
        assert_eq!(minor, 1);
        assert_eq!(patch, 0);
    }
}
