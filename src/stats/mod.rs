//! Statistics Engine: per-sequence alignment statistics gathered in one
//! parallel sweep over an overlap dataset, feeding the robust threshold
//! derivation in [`robust`].

pub mod robust;

use ahash::AHashMap;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tracing::info;

use crate::config::LengthMismatchPolicy;
use crate::error::{BridgeError, Result};
use crate::overlap::store::lock;
use crate::overlap::{Overlap, OverlapSource};
use crate::seq::SeqId;

/// A worker's private map is merged into the shared result once it holds
/// this many sequences.
pub const SPILL_CAPACITY: usize = 50_000;

/// Overlaps with a shorter aligned span do not contribute statistics.
pub const MIN_STAT_ALIGNED_LENGTH: u32 = 2000;

pub type StatsMap = AHashMap<SeqId, ReadStatInfo>;

/// Aggregate alignment statistics of one sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadStatInfo {
    /// Identity of the best-scoring overlap.
    pub identity: f64,
    /// Best `identity * aligned length` seen.
    pub score: i64,
    pub len: u32,
    /// Cumulative aligned bases.
    pub aligned: u64,
    pub count: u32,
    /// Largest overhang seen, `-1` if no overlap had a measurable one.
    pub overhang: i64,
    pub oh_count: u32,
}

impl ReadStatInfo {
    fn single(identity: f64, score: i64, len: u32, aligned: u32, overhang: i64) -> Self {
        Self {
            identity,
            score,
            len,
            aligned: aligned as u64,
            count: 1,
            overhang: if overhang >= 0 { overhang } else { -1 },
            oh_count: u32::from(overhang >= 0),
        }
    }

    /// Fold `other` into `self`. Commutative and associative, so merge order
    /// across workers and spills never changes the result.
    pub fn combine(&mut self, id: SeqId, other: &ReadStatInfo, policy: LengthMismatchPolicy) -> Result<()> {
        if other.score > self.score || (other.score == self.score && other.identity > self.identity) {
            self.score = other.score;
            self.identity = other.identity;
        }

        if self.len != other.len {
            match policy {
                LengthMismatchPolicy::Fatal => {
                    return Err(BridgeError::LengthMismatch {
                        id,
                        expected: self.len,
                        found: other.len,
                    })
                }
                LengthMismatchPolicy::KeepLongest => self.len = self.len.max(other.len),
            }
        }

        self.aligned += other.aligned;
        self.count += other.count;
        if other.overhang >= 0 {
            self.overhang = self.overhang.max(other.overhang);
            self.oh_count += other.oh_count;
        }
        Ok(())
    }
}

/// Merge every entry of `local` into `shared`, leaving `local` empty.
pub fn combine_maps(shared: &mut StatsMap, local: &mut StatsMap, policy: LengthMismatchPolicy) -> Result<()> {
    for (id, info) in local.drain() {
        match shared.get_mut(&id) {
            Some(existing) => existing.combine(id, &info, policy)?,
            None => {
                shared.insert(id, info);
            }
        }
    }
    Ok(())
}

/// Which overlaps contribute statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatFilter {
    /// Overlaps must be strictly above this identity.
    pub identity_floor: f64,
    /// Overhang tolerance used to reject abnormal alignment geometry.
    pub overhang_floor: i64,
}

impl StatFilter {
    pub fn accepts(&self, o: &Overlap) -> bool {
        o.identity > self.identity_floor
            && o.aligned_length() >= MIN_STAT_ALIGNED_LENGTH
            && o.location(self.overhang_floor).is_normal()
    }
}

/// A worker-private accumulator that spills into the shared map when full.
pub struct StatAccumulator<'a> {
    local: StatsMap,
    shared: &'a Mutex<StatsMap>,
    policy: LengthMismatchPolicy,
    capacity: usize,
}

impl<'a> StatAccumulator<'a> {
    pub fn new(shared: &'a Mutex<StatsMap>, policy: LengthMismatchPolicy, capacity: usize) -> Self {
        Self {
            local: StatsMap::new(),
            shared,
            policy,
            capacity: capacity.max(1),
        }
    }

    fn update(&mut self, id: SeqId, info: ReadStatInfo) -> Result<()> {
        match self.local.get_mut(&id) {
            Some(existing) => existing.combine(id, &info, self.policy),
            None => {
                self.local.insert(id, info);
                Ok(())
            }
        }
    }

    /// Account for one overlap on both of its sides if it passes `filter`.
    pub fn add(&mut self, o: &Overlap, filter: &StatFilter) -> Result<()> {
        if filter.accepts(o) {
            let overhang = o.overhang();
            let score = (o.identity * o.aligned_length() as f64) as i64;
            self.update(o.a.id, ReadStatInfo::single(o.identity, score, o.a.len, o.a.aligned(), overhang[0]))?;
            self.update(o.b.id, ReadStatInfo::single(o.identity, score, o.b.len, o.b.aligned(), overhang[1]))?;
        }
        if self.local.len() >= self.capacity {
            self.spill()?;
        }
        Ok(())
    }

    /// Merge the private map into the shared one under the lock.
    pub fn spill(&mut self) -> Result<()> {
        if self.local.is_empty() {
            return Ok(());
        }
        let mut shared = lock(self.shared);
        combine_maps(&mut shared, &mut self.local, self.policy)
    }
}

/// Parallel statistics sweep over an overlap source.
#[derive(Debug, Clone, Copy)]
pub struct StatsEngine {
    filter: StatFilter,
    threads: usize,
    policy: LengthMismatchPolicy,
    spill_capacity: usize,
}

impl StatsEngine {
    pub fn new(filter: StatFilter) -> Self {
        Self {
            filter,
            threads: 1,
            policy: LengthMismatchPolicy::Fatal,
            spill_capacity: SPILL_CAPACITY,
        }
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn policy(mut self, policy: LengthMismatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn spill_capacity(mut self, capacity: usize) -> Self {
        self.spill_capacity = capacity.max(1);
        self
    }

    pub fn compute<S: OverlapSource>(&self, source: &mut S) -> Result<StatsMap> {
        let shared = Mutex::new(StatsMap::new());
        let filter = self.filter;
        let outcome = source.scan(
            self.threads,
            || StatAccumulator::new(&shared, self.policy, self.spill_capacity),
            |acc, o| {
                acc.add(o, &filter)?;
                Ok(false)
            },
        )?;

        let scanned = outcome.scanned;
        for mut acc in outcome.workers {
            acc.spill()?;
        }

        let stats = shared.into_inner().unwrap_or_else(PoisonError::into_inner);
        info!("Collected statistics for {} sequences from {} overlaps", stats.len(), scanned);
        Ok(stats)
    }
}

/// Statistics of every sequence touched by an overlap above `identity_floor`
/// with normal geometry under `overhang_floor`.
pub fn compute_stats<S: OverlapSource>(
    source: &mut S,
    identity_floor: f64,
    overhang_floor: i64,
    threads: usize,
) -> Result<StatsMap> {
    StatsEngine::new(StatFilter { identity_floor, overhang_floor })
        .threads(threads)
        .compute(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::{Area, InMemoryOverlaps};
    use crate::seq::Strand;

    fn dovetail(a: SeqId, b: SeqId, identity: f64) -> Overlap {
        Overlap::new(
            Area::new(a, 7000, 10000, 10000),
            Area::new(b, 0, 3000, 8000),
            Strand::Forward,
            identity,
        )
    }

    #[test]
    fn test_combine_keeps_best_score() {
        let mut x = ReadStatInfo::single(90.0, 100, 500, 50, -1);
        let y = ReadStatInfo::single(95.0, 200, 500, 60, 12);
        x.combine(1, &y, LengthMismatchPolicy::Fatal).unwrap();
        assert_eq!(x.score, 200);
        assert_eq!(x.identity, 95.0);
        assert_eq!(x.aligned, 110);
        assert_eq!(x.count, 2);
        assert_eq!((x.overhang, x.oh_count), (12, 1));
    }

    #[test]
    fn test_combine_length_policies() {
        let mut x = ReadStatInfo::single(90.0, 100, 500, 50, 0);
        let y = ReadStatInfo::single(90.0, 100, 700, 50, 0);
        assert!(matches!(
            x.combine(4, &y, LengthMismatchPolicy::Fatal),
            Err(BridgeError::LengthMismatch { id: 4, expected: 500, found: 700 })
        ));

        let mut x = ReadStatInfo::single(90.0, 100, 500, 50, 0);
        x.combine(4, &y, LengthMismatchPolicy::KeepLongest).unwrap();
        assert_eq!(x.len, 700);
    }

    #[test]
    fn test_filter_rejects_low_identity_short_and_abnormal() {
        let filter = StatFilter { identity_floor: 75.0, overhang_floor: 500 };
        assert!(filter.accepts(&dovetail(0, 1, 90.0)));
        assert!(!filter.accepts(&dovetail(0, 1, 75.0)));

        let short = Overlap::new(Area::new(0, 9000, 10000, 10000), Area::new(1, 0, 1000, 8000), Strand::Forward, 99.0);
        assert!(!filter.accepts(&short));

        let local = Overlap::new(Area::new(0, 3000, 6000, 10000), Area::new(1, 2000, 5000, 8000), Strand::Forward, 99.0);
        assert!(!filter.accepts(&local));
    }

    #[test]
    fn test_spilling_matches_unspilled() {
        let records: Vec<Overlap> = (0..200).map(|i| dovetail(i % 37, 100 + i % 11, 80.0 + (i % 7) as f64)).collect();
        let filter = StatFilter { identity_floor: 75.0, overhang_floor: 500 };

        let baseline = StatsEngine::new(filter).compute(&mut InMemoryOverlaps::new(&records)).unwrap();
        let spilled = StatsEngine::new(filter)
            .threads(3)
            .spill_capacity(2)
            .compute(&mut InMemoryOverlaps::new(&records).with_block_size(9))
            .unwrap();
        assert_eq!(baseline, spilled);
        assert_eq!(baseline.len(), 48);
        assert_eq!(baseline[&0].count, 6);
    }
}
