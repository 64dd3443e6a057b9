use ahash::AHashSet;
use ctgbridge::config::BranchPolicy;
use ctgbridge::graph::{build_outputs, BestCriterion, ContigGraph, ContigLink};
use ctgbridge::seq::{ContigEnd, SeqArea, SequenceStore, Strand};

fn resolved(links: &[ContigLink], contained: AHashSet<u32>) -> ContigGraph {
    let mut graph = ContigGraph::from_links(links, contained);
    graph.calculate_best(BestCriterion::Support);
    graph.identify_paths(BranchPolicy::Best, 0.5);
    graph
}

#[test]
fn test_round_trip_with_filler() {
    let mut store = SequenceStore::new();
    let ids: Vec<u32> = ["AAAA", "CCCC", "GGGG"]
        .iter()
        .enumerate()
        .map(|(i, s)| store.insert(&format!("ctg{}", i), *s))
        .collect();
    let read = store.insert("read", "TT");

    let links: Vec<ContigLink> = ids
        .windows(2)
        .map(|w| ContigLink {
            from: ContigEnd::forward(w[0]),
            to: ContigEnd::forward(w[1]),
            from_len: 4,
            to_len: 4,
            support: 5.0,
            read_count: 5,
            ctg_count: 0,
            gap: 2,
            filler: Some(SeqArea::new(read, Strand::Forward, 0, 2)),
        })
        .collect();

    let graph = resolved(&links, AHashSet::new());
    let out = build_outputs(&graph, &store, &ids, 0).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].sequence, "AAAATTCCCCTTGGGG");
    assert_eq!(out[0].length, 16);
}

#[test]
fn test_overlapping_reverse_contig_is_trimmed() {
    let mut store = SequenceStore::new();
    let a = store.insert("a", "AAAAGGC");
    // reverse complement is GCTTTT; its first two bases repeat the end of `a`
    let b = store.insert("b", "AAAAGC");

    let link = ContigLink {
        from: ContigEnd::forward(a),
        to: ContigEnd::reverse(b),
        from_len: 7,
        to_len: 6,
        support: 3.0,
        read_count: 0,
        ctg_count: 1,
        gap: -2,
        filler: None,
    };
    let graph = resolved(&[link], AHashSet::new());
    let out = build_outputs(&graph, &store, &[a, b], 0).unwrap();

    assert_eq!(out.len(), 1);
    let joined = &out[0];
    // the path may be reported on either strand
    let expected = "AAAAGGCTTTT";
    let mirrored = ctgbridge::seq::reverse_complement(expected);
    assert!(joined.sequence == expected || joined.sequence == mirrored, "{}", joined.sequence);
    assert_eq!(joined.length, 11);
}

#[test]
fn test_contained_contig_never_standalone() {
    let mut store = SequenceStore::new();
    let big = store.insert("big", "ACGTACGTACGTACGT");
    let inner = store.insert("inner", "CGTACGTA");
    let other = store.insert("other", "TTTTTTTT");

    let graph = resolved(&[], AHashSet::from_iter([inner]));
    let out = build_outputs(&graph, &store, &[big, inner, other], 0).unwrap();
    let names: Vec<&str> = out.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["big", "other"]);
}

#[test]
fn test_short_outputs_dropped() {
    let mut store = SequenceStore::new();
    let long = store.insert("long", "ACGTACGTAC");
    let short = store.insert("short", "ACG");

    let graph = resolved(&[], AHashSet::new());
    let out = build_outputs(&graph, &store, &[long, short], 5).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name, "long");
}
