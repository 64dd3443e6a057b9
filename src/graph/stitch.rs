//! Bridge builder: concatenates contigs and filler along identified paths
//! and collects the standalone contigs no path uses.

use ahash::AHashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{BridgeError, Result};
use crate::graph::contig_graph::{ContigGraph, ContigPath};
use crate::io::fasta::FastaWriter;
use crate::seq::{SeqArea, SeqId, SequenceStore, Strand};

/// One output sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgedRecord {
    pub name: String,
    pub sequence: String,
    /// Projected length used for ordering.
    pub length: usize,
}

fn whole(store: &SequenceStore, id: SeqId, strand: Strand) -> Result<SeqArea> {
    let len = store.seq_len(id)? as u32;
    Ok(SeqArea::new(id, strand, 0, len))
}

/// Stitch one path into a single record.
pub fn stitch_path(graph: &ContigGraph, store: &SequenceStore, path: &ContigPath) -> Result<BridgedRecord> {
    let Some(first) = path.first() else {
        return Err(BridgeError::InvalidConfig("cannot stitch an empty path".into()));
    };
    let mut sequence = store.area(&whole(store, first.id, first.strand)?)?;
    let mut name = store.id_to_name(first.id)?.to_string();
    let mut length = sequence.len() as i64;

    for pair in path.windows(2) {
        let (u, v) = (pair[0], pair[1]);
        let edge = graph
            .edge(u, v)
            .ok_or_else(|| BridgeError::InvalidConfig(format!("no edge between {} and {}", u, v)))?;
        for area in edge.seq_areas() {
            sequence.push_str(&store.area(&area)?);
            name.push('_');
            name.push_str(store.id_to_name(area.id)?);
        }
        length += edge.link_length() - edge.link.from_len as i64;
    }

    Ok(BridgedRecord {
        name,
        sequence,
        length: length.max(0) as usize,
    })
}

/// Bridged records for every path plus standalone records for `contigs`
/// that are neither on a path nor contained, longest first. Records whose
/// sequence is shorter than `min_length` are dropped.
pub fn build_outputs(
    graph: &ContigGraph,
    store: &SequenceStore,
    contigs: &[SeqId],
    min_length: usize,
) -> Result<Vec<BridgedRecord>> {
    let mut records = Vec::with_capacity(graph.paths().len() + contigs.len());
    for path in graph.paths() {
        records.push(stitch_path(graph, store, path)?);
    }

    let used: AHashSet<SeqId> = graph.path_contigs();
    let mut standalone = 0usize;
    for &id in contigs {
        if used.contains(&id) || graph.contained().contains(&id) {
            continue;
        }
        let sequence = store.seq(id)?.to_string();
        records.push(BridgedRecord {
            name: store.id_to_name(id)?.to_string(),
            length: sequence.len(),
            sequence,
        });
        standalone += 1;
    }

    let before = records.len();
    records.retain(|r| r.sequence.len() >= min_length);
    records.sort_by(|x, y| y.length.cmp(&x.length).then_with(|| x.name.cmp(&y.name)));
    debug!("{} records shorter than {} dropped", before - records.len(), min_length);
    info!(
        "Built {} bridged and {} standalone sequences, {} kept",
        graph.paths().len(),
        standalone,
        records.len()
    );
    Ok(records)
}

/// Write records as FASTA; the file is created before anything is written.
pub fn write_outputs(records: &[BridgedRecord], path: &Path) -> Result<()> {
    let mut writer = FastaWriter::create(path)?;
    for r in records {
        writer.write_record(&r.name, &r.sequence).map_err(|e| BridgeError::io(path, e))?;
    }
    writer.finish().map_err(|e| BridgeError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BranchPolicy;
    use crate::graph::contig_graph::BestCriterion;
    use crate::graph::link::ContigLink;
    use crate::seq::ContigEnd;

    fn filler_link(from: SeqId, to: SeqId, read: SeqId) -> ContigLink {
        ContigLink {
            from: ContigEnd::forward(from),
            to: ContigEnd::forward(to),
            from_len: 4,
            to_len: 4,
            support: 3.0,
            read_count: 3,
            ctg_count: 0,
            gap: 2,
            filler: Some(SeqArea::new(read, Strand::Forward, 3, 5)),
        }
    }

    fn fixture() -> (SequenceStore, ContigGraph) {
        let mut store = SequenceStore::new();
        let a = store.insert("ctgA", "AAAA");
        let c = store.insert("ctgC", "CCCC");
        let g = store.insert("ctgG", "GGGG");
        let r = store.insert("read1", "GGGTTAAA");
        let links = [filler_link(a, c, r), filler_link(c, g, r)];
        let mut graph = ContigGraph::from_links(&links, AHashSet::new());
        graph.calculate_best(BestCriterion::Support);
        graph.identify_paths(BranchPolicy::Best, 0.5);
        (store, graph)
    }

    #[test]
    fn test_stitch_three_contigs_with_filler() {
        let (store, graph) = fixture();
        let records = build_outputs(&graph, &store, &[0, 1, 2], 1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sequence, "AAAATTCCCCTTGGGG");
        assert_eq!(records[0].length, 16);
        assert_eq!(records[0].name, "ctgA_read1_ctgC_read1_ctgG");
    }

    #[test]
    fn test_reverse_start_is_complemented() {
        let mut store = SequenceStore::new();
        store.insert("x", "AACC");
        let graph = ContigGraph::from_links(&[], AHashSet::new());
        let record = stitch_path(&graph, &store, &vec![ContigEnd::reverse(0)]).unwrap();
        assert_eq!(record.sequence, "GGTT");
    }

    #[test]
    fn test_contained_and_short_contigs_excluded() {
        let mut store = SequenceStore::new();
        store.insert("long", "ACGTACGTAC");
        store.insert("inner", "ACGTACGT");
        store.insert("tiny", "AC");
        let graph = ContigGraph::from_links(&[], AHashSet::from_iter([1]));

        let records = build_outputs(&graph, &store, &[0, 1, 2], 3).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["long"]);
    }

    #[test]
    fn test_outputs_sorted_longest_first() {
        let mut store = SequenceStore::new();
        store.insert("s", "ACG");
        store.insert("m", "ACGTAC");
        store.insert("l", "ACGTACGTA");
        let graph = ContigGraph::from_links(&[], AHashSet::new());
        let records = build_outputs(&graph, &store, &[0, 1, 2], 0).unwrap();
        let lengths: Vec<usize> = records.iter().map(|r| r.length).collect();
        assert_eq!(lengths, vec![9, 6, 3]);
    }

    #[test]
    fn test_write_outputs() {
        let (store, graph) = fixture();
        let records = build_outputs(&graph, &store, &[0, 1, 2], 1).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        write_outputs(&records, file.path()).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text, ">ctgA_read1_ctgC_read1_ctgG\nAAAATTCCCCTTGGGG\n");
    }
}
