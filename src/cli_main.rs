use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ctgbridge::config::{BranchPolicy, BridgeConfig, LengthMismatchPolicy};
use ctgbridge::overlap::OverlapFormat;
use ctgbridge::pipeline::OverlapKind;

#[derive(Parser, Debug)]
#[command(name = "ctgbridge", version, about = "Bridge assembly contigs with raw-read and contig overlaps", long_about = None)]
pub struct Cli {
    /// Log debug messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Join contigs along well-supported links and write the bridged set
    Bridge {
        /// Raw reads, FASTA/FASTQ(.gz)
        rawreads: PathBuf,

        /// Contigs, FASTA(.gz)
        contigs: PathBuf,

        /// Overlaps between raw reads (query) and contigs (target), PAF or M4
        read2ctg: PathBuf,

        /// Output FASTA(.gz) of bridged and standalone contigs
        bridged_contigs: PathBuf,

        /// Overlaps between contigs
        #[arg(long)]
        ctg2ctg_file: Option<PathBuf>,

        /// Overlap file format, detected from the extension when omitted
        #[arg(long, value_enum)]
        overlap_format: Option<OverlapFormat>,

        /// Minimum raw read length
        #[arg(long, default_value_t = 0)]
        read_min_length: u32,

        /// Minimum contig length for a contig to take part in links
        #[arg(long, default_value_t = 0)]
        ctg_min_length: u32,

        /// Minimum read2ctg identity; derived from the data when omitted
        #[arg(long)]
        read2ctg_min_identity: Option<f64>,

        /// Minimum ctg2ctg identity; derived from the data when omitted
        #[arg(long)]
        ctg2ctg_min_identity: Option<f64>,

        /// Maximum read2ctg overhang; derived from the data when omitted
        #[arg(long)]
        read2ctg_max_overhang: Option<i64>,

        /// Maximum ctg2ctg overhang; derived from the data when omitted
        #[arg(long)]
        ctg2ctg_max_overhang: Option<i64>,

        /// Minimum aligned length of read2ctg overlaps
        #[arg(long, default_value_t = 5000)]
        read2ctg_min_aligned_length: u32,

        /// Minimum aligned length of ctg2ctg overlaps
        #[arg(long, default_value_t = 5000)]
        ctg2ctg_min_aligned_length: u32,

        /// Minimum number of reads supporting a link
        #[arg(long, default_value_t = 3)]
        read2ctg_min_coverage: u32,

        /// Minimum length of an output sequence
        #[arg(long, default_value_t = 500)]
        min_contig_length: usize,

        /// Directory for dumped internal state
        #[arg(long, default_value = ".")]
        output_directory: PathBuf,

        /// Behaviour at a branching contig end
        #[arg(long, value_enum, default_value_t = BranchPolicy::Best)]
        select_branch: BranchPolicy,

        /// Edges with at least this share of the best support make a branch
        #[arg(long, default_value_t = 0.5)]
        branch_ratio: f64,

        /// What to do when overlaps disagree on a sequence length
        #[arg(long, value_enum, default_value_t = LengthMismatchPolicy::Fatal)]
        length_mismatch: LengthMismatchPolicy,

        /// Write id2name.txt, contig_graph.csv and links.txt
        #[arg(long)]
        dump: bool,

        /// Number of threads
        #[arg(long, default_value_t = num_cpus::get())]
        threads: usize,
    },

    /// Derive identity and overhang thresholds from an overlap file
    Stats {
        /// Overlap file, PAF or M4
        overlaps: PathBuf,

        /// Which thresholds to derive
        #[arg(long, value_enum, default_value_t = OverlapKind::Read2ctg)]
        kind: OverlapKind,

        /// Overlap file format, detected from the extension when omitted
        #[arg(long, value_enum)]
        overlap_format: Option<OverlapFormat>,

        /// What to do when overlaps disagree on a sequence length
        #[arg(long, value_enum, default_value_t = LengthMismatchPolicy::Fatal)]
        length_mismatch: LengthMismatchPolicy,

        /// Number of threads
        #[arg(long, default_value_t = num_cpus::get())]
        threads: usize,
    },
}

impl Commands {
    /// Build the run configuration of a `bridge` command.
    pub fn into_bridge_config(self) -> Option<BridgeConfig> {
        let Commands::Bridge {
            rawreads,
            contigs,
            read2ctg,
            bridged_contigs,
            ctg2ctg_file,
            overlap_format,
            read_min_length,
            ctg_min_length,
            read2ctg_min_identity,
            ctg2ctg_min_identity,
            read2ctg_max_overhang,
            ctg2ctg_max_overhang,
            read2ctg_min_aligned_length,
            ctg2ctg_min_aligned_length,
            read2ctg_min_coverage,
            min_contig_length,
            output_directory,
            select_branch,
            branch_ratio,
            length_mismatch,
            dump,
            threads,
        } = self
        else {
            return None;
        };

        let mut config = BridgeConfig::new(rawreads, contigs, read2ctg, bridged_contigs);
        config.ctg2ctg_file = ctg2ctg_file;
        config.overlap_format = overlap_format;
        config.read_min_length = read_min_length;
        config.ctg_min_length = ctg_min_length;
        config.read2ctg_min_identity = read2ctg_min_identity;
        config.ctg2ctg_min_identity = ctg2ctg_min_identity;
        config.read2ctg_max_overhang = read2ctg_max_overhang;
        config.ctg2ctg_max_overhang = ctg2ctg_max_overhang;
        config.read2ctg_min_aligned_length = read2ctg_min_aligned_length;
        config.ctg2ctg_min_aligned_length = ctg2ctg_min_aligned_length;
        config.read2ctg_min_coverage = read2ctg_min_coverage;
        config.min_contig_length = min_contig_length;
        config.output_directory = output_directory;
        config.select_branch = select_branch;
        config.branch_ratio = branch_ratio;
        config.length_mismatch = length_mismatch;
        config.dump = dump;
        config.threads = threads.max(1);
        Some(config)
    }
}
