use clap::ValueEnum;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::{BridgeError, Result};
use crate::overlap::OverlapFormat;

/// What to do at a graph node with more than one credible edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchPolicy {
    /// Do not select any branch; the path stops at the node.
    No,
    /// Select the most probable branch.
    Best,
}

/// How to treat two overlap records that disagree on a sequence's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LengthMismatchPolicy {
    /// Abort: the overlap dataset is corrupt.
    Fatal,
    /// Keep the longest reported length and carry on.
    KeepLongest,
}

/// Thresholds used by the link aggregator, fully resolved (no auto values).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkConfig {
    pub read2ctg_min_identity: f64,
    pub ctg2ctg_min_identity: f64,
    pub read_min_length: u32,
    pub ctg_min_length: u32,
    pub read2ctg_max_overhang: i64,
    pub ctg2ctg_max_overhang: i64,
    pub read2ctg_min_aligned_length: u32,
    pub ctg2ctg_min_aligned_length: u32,
    pub read2ctg_min_coverage: u32,
    pub length_mismatch: LengthMismatchPolicy,
    pub threads: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read2ctg_min_identity: 75.0,
            ctg2ctg_min_identity: 95.0,
            read_min_length: 0,
            ctg_min_length: 0,
            read2ctg_max_overhang: 500,
            ctg2ctg_max_overhang: 250,
            read2ctg_min_aligned_length: 5000,
            ctg2ctg_min_aligned_length: 5000,
            read2ctg_min_coverage: 3,
            length_mismatch: LengthMismatchPolicy::Fatal,
            threads: 1,
        }
    }
}

/// Everything the bridging run needs, built once from the command line.
///
/// `None` identities and overhangs are derived from the overlap data.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeConfig {
    pub read_file: PathBuf,
    pub contig_file: PathBuf,
    pub read2ctg_file: PathBuf,
    pub ctg2ctg_file: Option<PathBuf>,
    pub bridged_contig_file: PathBuf,
    pub output_directory: PathBuf,
    pub overlap_format: Option<OverlapFormat>,

    pub read_min_length: u32,
    pub ctg_min_length: u32,
    pub read2ctg_min_identity: Option<f64>,
    pub ctg2ctg_min_identity: Option<f64>,
    pub read2ctg_max_overhang: Option<i64>,
    pub ctg2ctg_max_overhang: Option<i64>,
    pub read2ctg_min_aligned_length: u32,
    pub ctg2ctg_min_aligned_length: u32,
    pub read2ctg_min_coverage: u32,
    pub min_contig_length: usize,

    pub select_branch: BranchPolicy,
    pub branch_ratio: f64,
    pub length_mismatch: LengthMismatchPolicy,
    pub dump: bool,
    pub threads: usize,
}

impl BridgeConfig {
    /// Defaults for everything except the four required files.
    pub fn new(read_file: PathBuf, contig_file: PathBuf, read2ctg_file: PathBuf, bridged_contig_file: PathBuf) -> Self {
        let link = LinkConfig::default();
        Self {
            read_file,
            contig_file,
            read2ctg_file,
            ctg2ctg_file: None,
            bridged_contig_file,
            output_directory: PathBuf::from("."),
            overlap_format: None,
            read_min_length: link.read_min_length,
            ctg_min_length: link.ctg_min_length,
            read2ctg_min_identity: None,
            ctg2ctg_min_identity: None,
            read2ctg_max_overhang: None,
            ctg2ctg_max_overhang: None,
            read2ctg_min_aligned_length: link.read2ctg_min_aligned_length,
            ctg2ctg_min_aligned_length: link.ctg2ctg_min_aligned_length,
            read2ctg_min_coverage: link.read2ctg_min_coverage,
            min_contig_length: 500,
            select_branch: BranchPolicy::Best,
            branch_ratio: 0.5,
            length_mismatch: LengthMismatchPolicy::Fatal,
            dump: false,
            threads: num_cpus::get(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.branch_ratio) || self.branch_ratio == 0.0 {
            return Err(BridgeError::InvalidConfig(format!(
                "branch_ratio must be in (0, 1], got {}",
                self.branch_ratio
            )));
        }
        if self.read2ctg_min_coverage == 0 {
            return Err(BridgeError::InvalidConfig("read2ctg_min_coverage must be at least 1".into()));
        }
        for identity in [self.read2ctg_min_identity, self.ctg2ctg_min_identity].into_iter().flatten() {
            if !(0.0..=100.0).contains(&identity) {
                return Err(BridgeError::InvalidConfig(format!("identity {} is not a percentage", identity)));
            }
        }
        Ok(())
    }
}
