use ctgbridge::config::{BranchPolicy, BridgeConfig};
use ctgbridge::error::BridgeError;
use ctgbridge::pipeline::ContigBridge;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const FILLER: &str = "ACGTACGTAC";

fn random_dna(rng: &mut StdRng, len: usize) -> String {
    let bases = ['A', 'C', 'G', 'T'];
    (0..len).map(|_| bases[rng.gen_range(0..4)]).collect()
}

struct Fixture {
    dir: TempDir,
    ctg1: String,
    ctg2: String,
}

impl Fixture {
    /// Two 300 bp contigs joined by three reads, each covering the last 100
    /// bases of ctg1, 10 filler bases and the first 100 bases of ctg2.
    /// ctg3 stands alone and ctg4 is too short for the output.
    fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(2024);
        let ctg1 = random_dna(&mut rng, 300);
        let ctg2 = random_dna(&mut rng, 300);
        let ctg3 = random_dna(&mut rng, 50);
        let dir = tempfile::tempdir().unwrap();

        let contigs = format!(">ctg1\n{}\n>ctg2\n{}\n>ctg3\n{}\n>ctg4\nACGTA\n", ctg1, ctg2, ctg3);
        fs::write(dir.path().join("contigs.fa"), contigs).unwrap();

        let read = format!("{}{}{}", &ctg1[200..], FILLER, &ctg2[..100]);
        let mut reads = String::new();
        let mut paf = String::new();
        for name in ["r1", "r2", "r3"] {
            reads.push_str(&format!(">{}\n{}\n", name, read));
            paf.push_str(&format!("{}\t210\t0\t100\t+\tctg1\t300\t200\t300\t95\t100\t60\n", name));
            paf.push_str(&format!("{}\t210\t110\t210\t+\tctg2\t300\t0\t100\t95\t100\t60\n", name));
        }
        fs::write(dir.path().join("reads.fa"), reads).unwrap();
        fs::write(dir.path().join("read2ctg.paf"), paf).unwrap();

        Fixture { dir, ctg1, ctg2 }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::new(
            self.path("reads.fa"),
            self.path("contigs.fa"),
            self.path("read2ctg.paf"),
            self.path("bridged.fa"),
        );
        config.read2ctg_min_identity = Some(80.0);
        config.read2ctg_max_overhang = Some(50);
        config.read2ctg_min_aligned_length = 100;
        config.read2ctg_min_coverage = 2;
        config.min_contig_length = 10;
        config.threads = 2;
        config
    }
}

fn read_fasta(path: &Path) -> Vec<(String, String)> {
    let text = fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    lines
        .chunks(2)
        .map(|pair| (pair[0].trim_start_matches('>').to_string(), pair[1].to_string()))
        .collect()
}

#[test]
fn test_bridges_contigs_through_read_filler() {
    let fx = Fixture::new();
    let records = ContigBridge::new(fx.config()).run().unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].length, 610);

    let written = read_fasta(&fx.path("bridged.fa"));
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].0, "ctg1_r1_ctg2");
    assert_eq!(written[0].1, format!("{}{}{}", fx.ctg1, FILLER, fx.ctg2));
    assert_eq!(written[1].0, "ctg3");
}

#[test]
fn test_auto_selected_thresholds_fall_back_to_floors() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.read2ctg_min_identity = None;
    config.read2ctg_max_overhang = None;

    let records = ContigBridge::new(config).run().unwrap();
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["ctg1_r1_ctg2", "ctg3"]);
}

#[test]
fn test_coverage_floor_leaves_contigs_unbridged() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.read2ctg_min_coverage = 4;
    config.select_branch = BranchPolicy::No;

    let records = ContigBridge::new(config).run().unwrap();
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["ctg1", "ctg2", "ctg3"]);
}

#[test]
fn test_dump_writes_diagnostics() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.dump = true;
    config.output_directory = fx.path("dump");

    ContigBridge::new(config).run().unwrap();
    for name in ["id2name.txt", "contig_graph.csv", "links.txt"] {
        assert!(fx.path("dump").join(name).exists(), "{} missing", name);
    }
    let links = fs::read_to_string(fx.path("dump").join("links.txt")).unwrap();
    assert_eq!(links.lines().count(), 2);
}

#[test]
fn test_unwritable_output_is_an_io_error() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.bridged_contig_file = fx.path("missing").join("bridged.fa");

    let result = ContigBridge::new(config).run();
    assert!(matches!(result, Err(BridgeError::Io { .. })));
}

#[test]
fn test_malformed_overlap_is_fatal() {
    let fx = Fixture::new();
    fs::write(fx.path("read2ctg.paf"), "r1\t210\t0\tabc\n").unwrap();

    let result = ContigBridge::new(fx.config()).run();
    assert!(matches!(result, Err(BridgeError::Parse { line: 1, .. })));
}
