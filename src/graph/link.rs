//! Link Aggregator: turns filtered overlaps into scored adjacency evidence
//! between contig ends.

use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::config::{LengthMismatchPolicy, LinkConfig};
use crate::error::{BridgeError, Result};
use crate::overlap::{Location, Overlap, OverlapSource};
use crate::seq::{ContigEnd, SeqArea, SeqId, Strand};

/// A directed link key; a link and its reverse complement share one key.
pub type LinkKey = (ContigEnd, ContigEnd);

/// Canonical key of `from -> to`, and whether it had to be flipped.
pub fn canonical_key(from: ContigEnd, to: ContigEnd) -> (LinkKey, bool) {
    let forward = (from, to);
    let reverse = (to.flip(), from.flip());
    if reverse < forward {
        (reverse, true)
    } else {
        (forward, false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EvidenceKind {
    /// A raw read spanning both contig ends.
    Read,
    /// A direct contig-to-contig dovetail overlap.
    Contig,
}

/// One observation that `from` is immediately followed by `to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkEvidence {
    pub kind: EvidenceKind,
    pub source: SeqId,
    /// Bases between the two contigs; negative when they overlap.
    pub gap: i64,
    /// Bases of the read filling a positive gap, oriented along the link.
    pub filler: Option<SeqArea>,
    pub identity: f64,
}

impl LinkEvidence {
    fn flipped(self) -> Self {
        Self {
            filler: self.filler.map(SeqArea::flipped),
            ..self
        }
    }
}

/// Aggregated evidence that contig end `from` immediately precedes `to`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContigLink {
    pub from: ContigEnd,
    pub to: ContigEnd,
    pub from_len: u32,
    pub to_len: u32,
    pub support: f64,
    pub read_count: u32,
    pub ctg_count: u32,
    /// Gap of the representative evidence; negative for overlapping contigs.
    pub gap: i64,
    pub filler: Option<SeqArea>,
}

impl ContigLink {
    pub fn key(&self) -> LinkKey {
        (self.from, self.to)
    }

    /// Expected span from the start of `from` to the end of `to`.
    pub fn link_length(&self) -> i64 {
        self.from_len as i64 + self.gap + self.to_len as i64
    }

    /// The same link walked on the opposite strand.
    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.flip(),
            to: self.from.flip(),
            from_len: self.to_len,
            to_len: self.from_len,
            filler: self.filler.map(SeqArea::flipped),
            ..self.clone()
        }
    }

    /// Sequence to append after `from` when stitching: the filler, then `to`
    /// trimmed by any overlap with `from`.
    pub fn seq_areas(&self) -> Vec<SeqArea> {
        let mut areas = Vec::with_capacity(2);
        if self.gap > 0 {
            if let Some(filler) = self.filler {
                areas.push(filler);
            }
        }
        let trim = (-self.gap).clamp(0, self.to_len as i64) as u32;
        areas.push(match self.to.strand {
            Strand::Forward => SeqArea::new(self.to.id, Strand::Forward, trim, self.to_len),
            Strand::Reverse => SeqArea::new(self.to.id, Strand::Reverse, 0, self.to_len - trim),
        });
        areas
    }
}

/// A contig laid onto a read's forward coordinates.
#[derive(Debug, Clone, Copy)]
struct Placement {
    contig: ContigEnd,
    /// Projected start/end of the whole contig in read coordinates.
    start: i64,
    end: i64,
    /// Aligned span on the read.
    read_start: u32,
    read_end: u32,
    /// Unaligned contig bases before / after the alignment, in read orientation.
    head: i64,
    tail: i64,
    identity: f64,
}

impl Placement {
    fn new(o: &Overlap) -> Self {
        let (cs, ce) = o.oriented_b();
        let head = cs as i64;
        let tail = o.b.len as i64 - ce as i64;
        Self {
            contig: ContigEnd::new(o.b.id, o.strand),
            start: o.a.start as i64 - head,
            end: o.a.end as i64 + tail,
            read_start: o.a.start,
            read_end: o.a.end,
            head,
            tail,
            identity: o.identity,
        }
    }
}

/// Evidence from one read's alignments (all with `a` = the read).
fn read_evidence(alignments: &[Overlap], max_overhang: i64) -> Vec<(LinkKey, LinkEvidence)> {
    let mut placed: Vec<Placement> = alignments.iter().map(Placement::new).collect();
    placed.sort_by_key(|p| (p.start, p.read_start, p.contig));

    let read = match alignments.first() {
        Some(o) => o.a.id,
        None => return Vec::new(),
    };

    placed
        .windows(2)
        .filter_map(|pair| {
            let (x, y) = (&pair[0], &pair[1]);
            if x.contig.id == y.contig.id
                || x.tail > max_overhang
                || y.head > max_overhang
                || y.read_end < x.read_end
                || y.end <= x.end
            {
                return None;
            }
            let gap = y.start - x.end;
            let filler = (gap > 0).then(|| SeqArea::new(read, Strand::Forward, x.end as u32, y.start as u32));
            let evidence = LinkEvidence {
                kind: EvidenceKind::Read,
                source: read,
                gap,
                filler,
                identity: x.identity.min(y.identity),
            };
            let (key, flipped) = canonical_key(x.contig, y.contig);
            Some((key, if flipped { evidence.flipped() } else { evidence }))
        })
        .collect()
}

/// Evidence from a contig-to-contig dovetail, or `None` for other geometry.
///
/// `b` is laid onto `a`'s forward coordinates; on `Right` it follows `a`,
/// on `Left` it precedes it.
fn contig_evidence(o: &Overlap, max_overhang: i64) -> Option<(LinkKey, LinkEvidence)> {
    let b = Placement::new(o);
    let a = ContigEnd::forward(o.a.id);
    let (from, to, gap) = match o.location(max_overhang) {
        Location::Right => (a, b.contig, b.start - o.a.len as i64),
        Location::Left => (b.contig, a, -b.end),
        _ => return None,
    };
    let evidence = LinkEvidence {
        kind: EvidenceKind::Contig,
        source: o.a.id.min(o.b.id),
        gap,
        filler: None,
        identity: o.identity,
    };
    let (key, flipped) = canonical_key(from, to);
    Some((key, if flipped { evidence.flipped() } else { evidence }))
}

/// The contig a containment-type overlap shows to be redundant.
fn contained_contig(o: &Overlap, max_overhang: i64) -> Option<SeqId> {
    match o.location(max_overhang) {
        Location::Contains => Some(o.b.id),
        Location::Contained => Some(o.a.id),
        Location::Equal => {
            let smaller_is_b = (o.b.len, std::cmp::Reverse(o.b.id)) < (o.a.len, std::cmp::Reverse(o.a.id));
            Some(if smaller_is_b { o.b.id } else { o.a.id })
        }
        _ => None,
    }
}

/// Keep one piece of evidence per source, the one with the best identity.
fn dedup_by_source(evidence: &mut Vec<LinkEvidence>) {
    evidence.sort_by(|x, y| {
        (x.kind as u8, x.source)
            .cmp(&(y.kind as u8, y.source))
            .then(y.identity.total_cmp(&x.identity))
            .then(x.gap.cmp(&y.gap))
    });
    evidence.dedup_by(|later, earlier| later.kind == earlier.kind && later.source == earlier.source);
}

/// Evidence whose gap is closest to the median gap; ties go to higher
/// identity, then the lower source id.
fn representative(evidence: &[LinkEvidence]) -> Option<&LinkEvidence> {
    let mut gaps: Vec<i64> = evidence.iter().map(|e| e.gap).collect();
    gaps.sort_unstable();
    let median = *gaps.get((gaps.len().saturating_sub(1)) / 2)?;
    evidence.iter().min_by(|x, y| {
        (x.gap - median)
            .abs()
            .cmp(&(y.gap - median).abs())
            .then(y.identity.total_cmp(&x.identity))
            .then(x.source.cmp(&y.source))
    })
}

/// Collects overlaps, then scores links between contig ends.
pub struct ContigLinks {
    config: LinkConfig,
    r2c: Vec<Overlap>,
    c2c: Vec<Overlap>,
    contig_lens: AHashMap<SeqId, u32>,
    contained: AHashSet<SeqId>,
    links: Vec<ContigLink>,
}

impl ContigLinks {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            r2c: Vec::new(),
            c2c: Vec::new(),
            contig_lens: AHashMap::new(),
            contained: AHashSet::new(),
            links: Vec::new(),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Load contig-to-contig overlaps passing the ctg2ctg thresholds.
    pub fn load_c2c<S: OverlapSource>(&mut self, source: &mut S) -> Result<usize> {
        let c = self.config;
        let outcome = source.scan(c.threads, || (), |_, o| {
            Ok(o.a.id != o.b.id
                && o.identity >= c.ctg2ctg_min_identity
                && o.aligned_length() >= c.ctg2ctg_min_aligned_length
                && o.a.len >= c.ctg_min_length
                && o.b.len >= c.ctg_min_length
                && o.location(c.ctg2ctg_max_overhang).is_normal())
        })?;
        for o in &outcome.retained {
            self.note_contig_len(o.a.id, o.a.len)?;
            self.note_contig_len(o.b.id, o.b.len)?;
        }
        let n = outcome.retained.len();
        self.c2c.extend(outcome.retained);
        info!("Kept {} ctg2ctg overlaps", n);
        Ok(n)
    }

    /// Load read-to-contig overlaps (`a` = read, `b` = contig) passing the
    /// read2ctg thresholds. Reads lying inside a contig cannot bridge and are
    /// dropped here.
    pub fn load_r2c<S: OverlapSource>(&mut self, source: &mut S) -> Result<usize> {
        let c = self.config;
        let outcome = source.scan(c.threads, || (), |_, o| {
            Ok(o.a.id != o.b.id
                && o.identity >= c.read2ctg_min_identity
                && o.aligned_length() >= c.read2ctg_min_aligned_length
                && o.a.len >= c.read_min_length
                && o.b.len >= c.ctg_min_length
                && !matches!(
                    o.location(c.read2ctg_max_overhang),
                    Location::Abnormal | Location::Contained
                ))
        })?;
        for o in &outcome.retained {
            self.note_contig_len(o.b.id, o.b.len)?;
        }
        let n = outcome.retained.len();
        self.r2c.extend(outcome.retained);
        info!("Kept {} read2ctg overlaps", n);
        Ok(n)
    }

    fn note_contig_len(&mut self, id: SeqId, len: u32) -> Result<()> {
        let known = self.contig_lens.entry(id).or_insert(len);
        if *known != len {
            match self.config.length_mismatch {
                LengthMismatchPolicy::Fatal => {
                    return Err(BridgeError::LengthMismatch { id, expected: *known, found: len })
                }
                LengthMismatchPolicy::KeepLongest => *known = (*known).max(len),
            }
        }
        Ok(())
    }

    /// Convert retained overlaps into scored links. Links below the coverage
    /// floor are discarded.
    pub fn analyze_support(&mut self) -> Result<()> {
        let c = self.config;

        self.contained = self
            .c2c
            .iter()
            .filter_map(|o| contained_contig(o, c.ctg2ctg_max_overhang))
            .collect();

        // r2c is sorted by read id, so each read's alignments are contiguous
        let mut groups: Vec<&[Overlap]> = Vec::new();
        let mut begin = 0;
        for i in 1..=self.r2c.len() {
            if i == self.r2c.len() || self.r2c[i].a.id != self.r2c[begin].a.id {
                groups.push(&self.r2c[begin..i]);
                begin = i;
            }
        }

        let mut observations: Vec<(LinkKey, LinkEvidence)> = groups
            .par_iter()
            .flat_map_iter(|group| read_evidence(group, c.read2ctg_max_overhang))
            .collect();
        observations.extend(self.c2c.iter().filter_map(|o| contig_evidence(o, c.ctg2ctg_max_overhang)));

        let mut by_key: AHashMap<LinkKey, Vec<LinkEvidence>> = AHashMap::new();
        for (key, evidence) in observations {
            if self.contained.contains(&key.0.id) || self.contained.contains(&key.1.id) {
                continue;
            }
            by_key.entry(key).or_default().push(evidence);
        }
        debug!("{} candidate links before support filtering", by_key.len());

        let contig_lens = &self.contig_lens;
        let candidates: Vec<(LinkKey, Vec<LinkEvidence>)> = by_key.into_iter().collect();
        let mut links: Vec<ContigLink> = candidates
            .into_par_iter()
            .filter_map(|(key, mut evidence)| score_link(key, &mut evidence, contig_lens, &c))
            .collect();
        links.sort_by_key(|l| l.key());

        info!(
            "{} links pass support filtering, {} contigs contained",
            links.len(),
            self.contained.len()
        );
        self.links = links;
        Ok(())
    }

    /// Scored links, sorted by canonical key.
    pub fn links(&self) -> &[ContigLink] {
        &self.links
    }

    pub fn contained(&self) -> &AHashSet<SeqId> {
        &self.contained
    }

    /// Reads whose bases are used as filler by some link.
    pub fn filler_sources(&self) -> AHashSet<SeqId> {
        self.links.iter().filter_map(|l| l.filler.map(|f| f.id)).collect()
    }

    /// Write one tab-separated line per scored link.
    pub fn dump(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| BridgeError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        let io = |e| BridgeError::io(path, e);
        writeln!(writer, "from\tto\tsupport\treads\tcontigs\tgap\tlink_length").map_err(io)?;
        for l in &self.links {
            writeln!(
                writer,
                "{}\t{}\t{:.3}\t{}\t{}\t{}\t{}",
                l.from, l.to, l.support, l.read_count, l.ctg_count, l.gap, l.link_length()
            )
            .map_err(io)?;
        }
        writer.flush().map_err(io)
    }
}

fn score_link(
    key: LinkKey,
    evidence: &mut Vec<LinkEvidence>,
    contig_lens: &AHashMap<SeqId, u32>,
    config: &LinkConfig,
) -> Option<ContigLink> {
    dedup_by_source(evidence);
    let read_count = evidence.iter().filter(|e| e.kind == EvidenceKind::Read).count() as u32;
    let ctg_count = evidence.len() as u32 - read_count;
    if read_count < config.read2ctg_min_coverage && ctg_count == 0 {
        return None;
    }

    let coverage_weight = config.read2ctg_min_coverage as f64;
    let support = evidence
        .iter()
        .map(|e| match e.kind {
            EvidenceKind::Read => e.identity / 100.0,
            EvidenceKind::Contig => coverage_weight * e.identity / 100.0,
        })
        .sum();

    let best = representative(evidence)?;
    let from_len = *contig_lens.get(&key.0.id)?;
    let to_len = *contig_lens.get(&key.1.id)?;
    if -best.gap >= from_len as i64 || -best.gap >= to_len as i64 {
        return None;
    }

    Some(ContigLink {
        from: key.0,
        to: key.1,
        from_len,
        to_len,
        support,
        read_count,
        ctg_count,
        gap: best.gap,
        filler: best.filler,
    })
}
