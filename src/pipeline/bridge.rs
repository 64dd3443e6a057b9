//! The bridging run: threshold selection, link aggregation, graph
//! resolution and stitching, in that order.

use clap::ValueEnum;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{BridgeConfig, LengthMismatchPolicy, LinkConfig};
use crate::error::{BridgeError, Result};
use crate::graph::contig_graph::{BestCriterion, ContigGraph};
use crate::graph::link::ContigLinks;
use crate::graph::stitch::{build_outputs, write_outputs, BridgedRecord};
use crate::overlap::{OverlapFile, OverlapSource};
use crate::seq::{NameTable, SequenceStore};
use crate::stats::robust::{
    identity_threshold, overhang_threshold, OverhangWeight, RobustEstimate, CTG2CTG_MAD_FACTOR,
    READ2CTG_MAD_FACTOR,
};
use crate::stats::{StatFilter, StatsEngine};

/// Which kind of overlap dataset thresholds are derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapKind {
    /// Raw reads aligned to contigs.
    Read2ctg,
    /// Contigs aligned to each other.
    Ctg2ctg,
}

impl OverlapKind {
    /// Loose filter applied while collecting statistics.
    pub fn scan_floor(self) -> StatFilter {
        match self {
            OverlapKind::Read2ctg => StatFilter { identity_floor: 75.0, overhang_floor: 500 },
            OverlapKind::Ctg2ctg => StatFilter { identity_floor: 95.0, overhang_floor: 250 },
        }
    }

    pub fn mad_factor(self) -> f64 {
        match self {
            OverlapKind::Read2ctg => READ2CTG_MAD_FACTOR,
            OverlapKind::Ctg2ctg => CTG2CTG_MAD_FACTOR,
        }
    }

    pub fn overhang_weight(self) -> OverhangWeight {
        match self {
            OverlapKind::Read2ctg => OverhangWeight::Score,
            OverlapKind::Ctg2ctg => OverhangWeight::Length,
        }
    }

    fn label(self) -> &'static str {
        match self {
            OverlapKind::Read2ctg => "read2ctg",
            OverlapKind::Ctg2ctg => "ctg2ctg",
        }
    }
}

/// Thresholds derived from one overlap dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectedThresholds {
    pub kind: OverlapKind,
    pub min_identity: f64,
    pub max_overhang: i64,
    /// `None` when the sample was too small and the scan floor was used.
    pub identity_estimate: Option<RobustEstimate>,
    pub overhang_estimate: Option<RobustEstimate>,
    pub sequences: usize,
}

/// Scan `source` once and derive identity and overhang thresholds for it.
pub fn select_thresholds<S: OverlapSource>(
    source: &mut S,
    kind: OverlapKind,
    threads: usize,
    policy: LengthMismatchPolicy,
) -> Result<SelectedThresholds> {
    let floor = kind.scan_floor();
    let stats = StatsEngine::new(floor).threads(threads).policy(policy).compute(source)?;
    let k = kind.mad_factor();

    let identity = identity_threshold(&stats, k);
    let min_identity = match identity {
        Some(t) => {
            info!(
                "Auto select {}_min_identity = {:.2}, median={:.2}, mad={:.2}",
                kind.label(),
                t.value,
                t.estimate.median,
                t.estimate.mad
            );
            t.value
        }
        None => {
            warn!(
                "Too few {} statistics to select min identity, using {}",
                kind.label(),
                floor.identity_floor
            );
            floor.identity_floor
        }
    };

    let overhang = overhang_threshold(&stats, k, kind.overhang_weight());
    let max_overhang = match overhang {
        Some(t) => {
            info!(
                "Auto select {}_max_overhang = {}, median={:.2}, mad={:.2}",
                kind.label(),
                t.value,
                t.estimate.median,
                t.estimate.mad
            );
            t.value
        }
        None => {
            warn!(
                "Too few {} statistics to select max overhang, using {}",
                kind.label(),
                floor.overhang_floor
            );
            floor.overhang_floor
        }
    };

    Ok(SelectedThresholds {
        kind,
        min_identity,
        max_overhang,
        identity_estimate: identity.map(|t| t.estimate),
        overhang_estimate: overhang.map(|t| t.estimate),
        sequences: stats.len(),
    })
}

/// Owns the configuration and the name table shared by every input file.
pub struct ContigBridge {
    config: BridgeConfig,
    names: NameTable,
}

impl ContigBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config, names: NameTable::new() }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn overlap_file<'a>(path: &Path, names: &'a mut NameTable, config: &BridgeConfig) -> OverlapFile<'a> {
        let file = OverlapFile::new(path, names);
        match config.overlap_format {
            Some(format) => file.with_format(format),
            None => file,
        }
    }

    /// Fill in every threshold the user left unset.
    pub fn resolve_link_config(&mut self) -> Result<LinkConfig> {
        let c = &self.config;
        let mut link = LinkConfig {
            read_min_length: c.read_min_length,
            ctg_min_length: c.ctg_min_length,
            read2ctg_min_aligned_length: c.read2ctg_min_aligned_length,
            ctg2ctg_min_aligned_length: c.ctg2ctg_min_aligned_length,
            read2ctg_min_coverage: c.read2ctg_min_coverage,
            length_mismatch: c.length_mismatch,
            threads: c.threads,
            ..LinkConfig::default()
        };

        match (c.read2ctg_min_identity, c.read2ctg_max_overhang) {
            (Some(identity), Some(overhang)) => {
                link.read2ctg_min_identity = identity;
                link.read2ctg_max_overhang = overhang;
            }
            (identity, overhang) => {
                info!("Auto select read2ctg parameters");
                let mut source = Self::overlap_file(&c.read2ctg_file, &mut self.names, c);
                let selected = select_thresholds(&mut source, OverlapKind::Read2ctg, c.threads, c.length_mismatch)?;
                link.read2ctg_min_identity = identity.unwrap_or(selected.min_identity);
                link.read2ctg_max_overhang = overhang.unwrap_or(selected.max_overhang);
            }
        }

        if let Some(identity) = c.ctg2ctg_min_identity {
            link.ctg2ctg_min_identity = identity;
        }
        if let Some(overhang) = c.ctg2ctg_max_overhang {
            link.ctg2ctg_max_overhang = overhang;
        }
        if let Some(ctg2ctg) = &c.ctg2ctg_file {
            if c.ctg2ctg_min_identity.is_none() || c.ctg2ctg_max_overhang.is_none() {
                info!("Auto select ctg2ctg parameters");
                let mut source = Self::overlap_file(ctg2ctg, &mut self.names, c);
                let selected = select_thresholds(&mut source, OverlapKind::Ctg2ctg, c.threads, c.length_mismatch)?;
                link.ctg2ctg_min_identity = c.ctg2ctg_min_identity.unwrap_or(selected.min_identity);
                link.ctg2ctg_max_overhang = c.ctg2ctg_max_overhang.unwrap_or(selected.max_overhang);
            }
        }
        Ok(link)
    }

    /// Run the whole bridging pipeline and write the output file.
    pub fn run(&mut self) -> Result<Vec<BridgedRecord>> {
        let start = Instant::now();
        self.config.validate()?;
        let arguments = serde_json::to_string_pretty(&self.config)
            .map_err(|e| BridgeError::InvalidConfig(e.to_string()))?;
        info!("Arguments: \n{}", arguments);

        let link_config = self.resolve_link_config()?;
        let mut links = ContigLinks::new(link_config);
        let c = &self.config;

        if let Some(ctg2ctg) = &c.ctg2ctg_file {
            info!("Load ctg2ctg file {}", ctg2ctg.display());
            links.load_c2c(&mut Self::overlap_file(ctg2ctg, &mut self.names, c))?;
        }
        info!("Load read2ctg file {}", c.read2ctg_file.display());
        links.load_r2c(&mut Self::overlap_file(&c.read2ctg_file, &mut self.names, c))?;

        info!("Selecting best links");
        links.analyze_support()?;

        info!("Create graph and identify best paths");
        let mut graph = ContigGraph::create(&links);
        graph.calculate_best(BestCriterion::Support);
        graph.identify_paths(c.select_branch, c.branch_ratio);

        let mut store = SequenceStore::with_names(std::mem::take(&mut self.names));
        info!("Load read file {}", c.read_file.display());
        store.load(&c.read_file, Some(&graph.filler_sources()), 0)?;
        info!("Load contig file {}", c.contig_file.display());
        store.load(&c.contig_file, None, 0)?;
        let contigs = store.ids_in_file(&c.contig_file).to_vec();

        let records = build_outputs(&graph, &store, &contigs, c.min_contig_length)?;
        info!("Save bridged contigs to {}", c.bridged_contig_file.display());
        write_outputs(&records, &c.bridged_contig_file)?;

        if c.dump {
            info!("Dump internal variables to {}", c.output_directory.display());
            fs::create_dir_all(&c.output_directory).map_err(|e| BridgeError::io(&c.output_directory, e))?;
            store.save_id_to_name(&c.output_directory.join("id2name.txt"))?;
            graph.write_csv(&c.output_directory.join("contig_graph.csv"))?;
            links.dump(&c.output_directory.join("links.txt"))?;
        }

        info!("END ({:.2}s)", start.elapsed().as_secs_f32());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::{Area, InMemoryOverlaps, Overlap};
    use crate::seq::Strand;

    fn dovetail(a: u32, b: u32, identity: f64, overhang: u32) -> Overlap {
        Overlap::new(
            Area::new(a, 7000 - overhang, 10000 - overhang, 10000),
            Area::new(b, 0, 3000, 8000),
            Strand::Forward,
            identity,
        )
    }

    #[test]
    fn test_select_thresholds_from_sample() {
        let records: Vec<Overlap> = (0..40)
            .map(|i| dovetail(i, 1000 + i, 90.0 + (i % 5) as f64, (i % 4) * 10))
            .collect();
        let selected = select_thresholds(
            &mut InMemoryOverlaps::new(&records),
            OverlapKind::Read2ctg,
            2,
            LengthMismatchPolicy::Fatal,
        )
        .unwrap();
        assert_eq!(selected.sequences, 80);
        assert!(selected.identity_estimate.is_some());
        // weighted median identity is 92 with a MAD of 1
        assert!((selected.min_identity - (92.0 - 3.0 * 1.4826)).abs() < 1e-9);
        // most sequences have no overhang at all
        assert_eq!(selected.max_overhang, 0);
    }

    #[test]
    fn test_degenerate_sample_falls_back_to_floor() {
        let selected = select_thresholds(
            &mut InMemoryOverlaps::new(&[]),
            OverlapKind::Ctg2ctg,
            1,
            LengthMismatchPolicy::Fatal,
        )
        .unwrap();
        assert_eq!(selected.min_identity, 95.0);
        assert_eq!(selected.max_overhang, 250);
        assert!(selected.identity_estimate.is_none());
    }
}
