use popgraph_lib::node::bases_in_mask;
use popgraph_lib::{GraphBuilder, GraphConfig, Kmer, KmerStore, Orientation};
use proptest::prelude::*;
use std::collections::HashSet;

fn dna(len: impl Into<prop::collection::SizeRange>) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(b"ACGT".to_vec()), len)
}

proptest! {
    #[test]
    fn prop_canonical_is_strand_independent(seq in dna(21)) {
        let kmer = Kmer::<21>::from_ascii(&seq).unwrap();
        let rc = kmer.reverse_complement();

        prop_assert_eq!(rc.reverse_complement(), kmer);
        prop_assert_eq!(kmer.canonical(), rc.canonical());
        prop_assert_eq!(kmer.canonical().canonical(), kmer.canonical());
        let kmer_str = kmer.to_string();
        prop_assert_eq!(kmer_str.as_bytes(), &seq[..]);

        let (canonical, orientation) = kmer.canonical_with_orientation();
        prop_assert_eq!(canonical.oriented(orientation), kmer);
    }

    #[test]
    fn prop_canonical_two_word_kmers(seq in dna(47)) {
        let kmer = Kmer::<47>::from_ascii(&seq).unwrap();
        let rc = kmer.reverse_complement();
        prop_assert_eq!(rc.reverse_complement(), kmer);
        prop_assert_eq!(kmer.canonical(), rc.canonical());
        prop_assert!(kmer.canonical() <= kmer && kmer.canonical() <= rc);
    }

    #[test]
    fn prop_insert_is_idempotent(seqs in prop::collection::vec(dna(11), 1..64)) {
        let mut store = KmerStore::<11>::new(1);
        let kmers: Vec<Kmer<11>> = seqs.iter().map(|s| Kmer::from_ascii(s).unwrap()).collect();

        let first: Vec<_> = kmers.iter().map(|&k| store.find_or_insert(k)).collect();
        let distinct: HashSet<_> = kmers.iter().map(|k| k.canonical()).collect();
        prop_assert_eq!(store.len(), distinct.len());

        for (&kmer, &(handle, orientation, _)) in kmers.iter().zip(first.iter()) {
            let (again, again_orientation, was_new) = store.find_or_insert(kmer);
            prop_assert!(!was_new);
            prop_assert_eq!(again, handle);
            prop_assert_eq!(again_orientation, orientation);

            let (found, _) = store.find(kmer.reverse_complement()).unwrap();
            prop_assert_eq!(found, handle);
        }
        prop_assert_eq!(store.len(), distinct.len());
    }

    #[test]
    fn prop_edges_are_reciprocal(reads in prop::collection::vec(dna(9..40), 1..8)) {
        let config = GraphConfig::new(7, 1).unwrap();
        let mut store = KmerStore::<7>::new(1);
        let mut builder = GraphBuilder::new(&mut store, &config).unwrap();
        for read in &reads {
            builder.load_record(read, &[], 0).unwrap();
        }

        for (handle, kmer) in store.iter() {
            for orientation in [Orientation::Forward, Orientation::Reverse] {
                let oriented = kmer.oriented(orientation);
                for base in bases_in_mask(store.out_bases(handle, orientation, 0)) {
                    let (next, next_orientation) =
                        store.next_node(handle, orientation, 0, base).unwrap();
                    let incoming = store.in_bases(next, next_orientation, 0);
                    prop_assert!(incoming & (1 << oriented.first_base()) != 0);
                }
            }
        }
    }

    #[test]
    fn prop_coverage_counts_occurrences(read in dna(7..60)) {
        let config = GraphConfig::new(7, 2).unwrap();
        let mut store = KmerStore::<7>::new(2);
        let mut builder = GraphBuilder::new(&mut store, &config).unwrap();
        builder.load_record(&read, &[], 1).unwrap();

        let total: u64 = store.handles().map(|h| store.coverage(h, 1) as u64).sum();
        prop_assert_eq!(total, (read.len() - 7 + 1) as u64);
        prop_assert!(store.handles().all(|h| store.coverage(h, 0) == 0));
    }
}
