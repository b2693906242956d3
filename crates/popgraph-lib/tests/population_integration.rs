//! Integration tests for loading populations and walking the graph
//!
//! These tests run the full path from list files on disk through ingestion,
//! persistence and traversal.

use popgraph_lib::builder::{
    load_population_as_binaries, load_population_as_fasta, mark_reference, GraphBuilder,
    GraphConfig,
};
use popgraph_lib::{
    supernode_sequences, traverse_supernodes, FastaReader, Kmer, KmerStore, NodeStatus,
};
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use tempfile::TempDir;

fn data(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(path)
}

fn sorted(mut seqs: Vec<String>) -> Vec<String> {
    seqs.sort();
    seqs
}

fn scenario_a() -> KmerStore<3> {
    let config = GraphConfig::new(3, 2).unwrap();
    let mut store = KmerStore::<3>::new(2);
    let mut builder = GraphBuilder::new(&mut store, &config).unwrap();
    let stats = load_population_as_fasta(&mut builder, data("scenario_a/population.list")).unwrap();
    assert_eq!(stats.bases_loaded, 44);
    assert_eq!(stats.records_read, 4);
    assert_eq!(stats.bad_reads, 0);
    store
}

fn scenario_b() -> KmerStore<5> {
    let config = GraphConfig::new(5, 3).unwrap();
    let mut store = KmerStore::<5>::new(3);
    let mut builder = GraphBuilder::new(&mut store, &config).unwrap();
    let stats = load_population_as_fasta(&mut builder, data("scenario_b/population.list")).unwrap();
    assert_eq!(stats.bases_loaded, 55);
    assert_eq!(stats.bad_reads, 0);
    store
}

#[test]
fn test_two_person_population() {
    let mut store = scenario_a();
    assert_eq!(store.len(), 7);

    assert_eq!(sorted(supernode_sequences(&mut store, 0)), vec!["AAA", "AACGTT"]);
    assert_eq!(sorted(supernode_sequences(&mut store, 1)), vec!["CCC", "CGTCAA"]);
}

#[test]
fn test_three_person_population() {
    let mut store = scenario_b();
    assert_eq!(store.len(), 27);

    assert_eq!(supernode_sequences(&mut store, 0), vec!["AAGCCTCGACAGCCATGC"]);
    assert_eq!(supernode_sequences(&mut store, 1), vec!["AAGCCTCGTTCGGCCATGC"]);
    assert_eq!(
        supernode_sequences(&mut store, 2),
        vec!["AAGCCTCGCTA", "GCATGGCTA", "GCTAGC"]
    );
}

#[test]
fn test_reset_between_passes() {
    let mut store = scenario_b();

    let first = traverse_supernodes(&mut store, 2, |_, _| Ok::<(), ()>(())).unwrap();
    assert_eq!(first.supernodes, 3);
    let visited = store.handles().filter(|&h| store.status(h).is_visited()).count();
    assert_eq!(visited, first.nodes_visited);

    // Nothing is left to walk until the flags are cleared
    let again = traverse_supernodes(&mut store, 2, |_, _| Ok::<(), ()>(())).unwrap();
    assert_eq!(again.supernodes, 0);

    assert_eq!(store.reset_visited(), visited);
    assert!(store.handles().all(|h| store.status(h) == NodeStatus::None));

    let second = traverse_supernodes(&mut store, 2, |_, _| Ok::<(), ()>(())).unwrap();
    assert_eq!(second, first);
}

#[test]
fn test_reset_keeps_reference_membership() {
    let mut store = scenario_b();
    let mut reference = FastaReader::new(Cursor::new(">chr\nAAGCCTCGA\n"), 1000);
    let marked = mark_reference(&mut store, &mut reference, 1000).unwrap();
    assert_eq!(marked.kmers_marked, 5);

    supernode_sequences(&mut store, 0);
    let in_reference = store
        .handles()
        .filter(|&h| store.status(h) == NodeStatus::ExistsInReference)
        .count();
    assert_eq!(in_reference, 5);
}

#[test]
fn test_binary_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.bin");
    let mut original = scenario_a();
    original.save_to_file(&path).unwrap();

    let mut restored = KmerStore::<3>::new(2);
    assert_eq!(restored.load_from_file(&path).unwrap(), 7);
    assert_eq!(restored.len(), original.len());
    for (handle, kmer) in original.iter() {
        let (other, _) = restored.find(kmer).unwrap();
        for colour in 0..2 {
            assert_eq!(restored.edges(other, colour), original.edges(handle, colour));
            assert_eq!(restored.coverage(other, colour), original.coverage(handle, colour));
        }
    }
    for colour in 0..2 {
        assert_eq!(
            sorted(supernode_sequences(&mut restored, colour)),
            sorted(supernode_sequences(&mut original, colour))
        );
    }

    // A second load merges into the same nodes
    restored.load_from_file(&path).unwrap();
    assert_eq!(restored.len(), original.len());
    let (aaa, _) = restored.find(Kmer::from_str("AAA").unwrap()).unwrap();
    assert_eq!(restored.coverage(aaa, 0), 20);
    assert_eq!(restored.coverage(aaa, 1), 0);
}

#[test]
fn test_population_of_single_colour_binaries() {
    let dir = TempDir::new().unwrap();
    let original = scenario_b();

    let mut people = String::new();
    for colour in 0..3 {
        let bin = dir.path().join(format!("person{}.bin", colour));
        let mut bytes = Vec::new();
        original.save_colour(&mut bytes, colour).unwrap();
        fs::write(&bin, bytes).unwrap();

        let list = format!("person{}.list", colour);
        fs::write(dir.path().join(&list), format!("person{}.bin\n", colour)).unwrap();
        people.push_str(&list);
        people.push('\n');
    }
    let population = dir.path().join("population.list");
    fs::write(&population, people).unwrap();

    let config = GraphConfig::new(5, 3).unwrap();
    let mut store = KmerStore::<5>::new(3);
    let mut builder = GraphBuilder::new(&mut store, &config).unwrap();
    let stats = load_population_as_binaries(&mut builder, &population).unwrap();
    assert_eq!(stats.kmers_loaded, 14 + 15 + 13);

    assert_eq!(store.len(), 27);
    assert_eq!(
        supernode_sequences(&mut store, 2),
        vec!["AAGCCTCGCTA", "GCATGGCTA", "GCTAGC"]
    );
}

#[test]
fn test_malformed_records_are_skipped() {
    let config = GraphConfig::new(5, 1).unwrap();
    let mut store = KmerStore::<5>::new(1);
    let mut builder = GraphBuilder::new(&mut store, &config).unwrap();
    let stats = builder
        .load_fastq_file(data("malformed/reads.fq"), 0)
        .unwrap();

    assert_eq!(stats.records_read, 4);
    assert_eq!(stats.bad_reads, 2);
    assert_eq!(stats.bases_loaded, 16);
    assert_eq!(stats.kmers_loaded, 8);

    assert!(store.find(Kmer::from_str("TTGCA").unwrap()).is_some());
    assert!(store.find(Kmer::from_str("GCAAC").unwrap()).is_some());
}

#[test]
fn test_missing_person_file_names_path() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("p.list"), "missing.fa\n").unwrap();
    let population = dir.path().join("population.list");
    fs::write(&population, "p.list\n").unwrap();

    let config = GraphConfig::new(3, 1).unwrap();
    let mut store = KmerStore::<3>::new(1);
    let mut builder = GraphBuilder::new(&mut store, &config).unwrap();
    let err = load_population_as_fasta(&mut builder, &population).unwrap_err();
    assert!(format!("{:#}", err).contains("missing.fa"));
}
