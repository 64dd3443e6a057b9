//! Weighted median / median-absolute-deviation thresholds.
//!
//! Alignment scores and overhangs have heavy right tails, so thresholds are
//! placed `k` scaled MADs away from the weighted median instead of using a
//! mean and standard deviation.

use serde::Serialize;

use super::StatsMap;

/// Converts a MAD into a standard-deviation equivalent for normal data.
pub const MAD_SCALE: f64 = 1.4826;

/// Fewer usable samples than this yield no threshold.
pub const MIN_ROBUST_SAMPLES: usize = 3;

/// MAD multiplier for read-to-contig thresholds.
pub const READ2CTG_MAD_FACTOR: f64 = 3.0;

/// MAD multiplier for contig-to-contig thresholds.
pub const CTG2CTG_MAD_FACTOR: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RobustEstimate {
    pub median: f64,
    pub mad: f64,
    pub samples: usize,
}

/// A derived threshold together with the estimate it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Threshold<T> {
    pub value: T,
    pub estimate: RobustEstimate,
}

/// Weight given to each sequence when deriving an overhang threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverhangWeight {
    /// `len / 100`, used for contig-to-contig data.
    Length,
    /// `score / 100`, used for read-to-contig data.
    Score,
}

fn usable(samples: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut kept: Vec<(f64, f64)> = samples
        .iter()
        .copied()
        .filter(|(v, w)| v.is_finite() && w.is_finite() && *w > 0.0)
        .collect();
    kept.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.total_cmp(&y.1)));
    kept
}

fn median_of_sorted(sorted: &[(f64, f64)]) -> Option<f64> {
    let total: f64 = sorted.iter().map(|(_, w)| w).sum();
    if sorted.is_empty() || total <= 0.0 {
        return None;
    }
    let half = total / 2.0;
    let mut acc = 0.0;
    for (value, weight) in sorted {
        acc += weight;
        if acc >= half {
            return Some(*value);
        }
    }
    sorted.last().map(|(v, _)| *v)
}

/// Weighted median of `(value, weight)` pairs; non-finite values and
/// non-positive weights are ignored.
pub fn weighted_median(samples: &[(f64, f64)]) -> Option<f64> {
    median_of_sorted(&usable(samples))
}

/// Weighted median and weighted MAD, or `None` when the sample is too small
/// to say anything.
pub fn median_absolute_deviation(samples: &[(f64, f64)]) -> Option<RobustEstimate> {
    let sorted = usable(samples);
    if sorted.len() < MIN_ROBUST_SAMPLES {
        return None;
    }
    let median = median_of_sorted(&sorted)?;
    let deviations: Vec<(f64, f64)> = sorted.iter().map(|(v, w)| ((v - median).abs(), *w)).collect();
    let mad = median_of_sorted(&usable(&deviations))?;
    Some(RobustEstimate {
        median,
        mad,
        samples: sorted.len(),
    })
}

/// `(best identity, score / 1000)` for every sequence.
pub fn identity_sample(stats: &StatsMap) -> Vec<(f64, f64)> {
    stats.values().map(|s| (s.identity, s.score as f64 / 1000.0)).collect()
}

/// `(max overhang, weight)` for every sequence that had a measurable overhang.
pub fn overhang_sample(stats: &StatsMap, weight: OverhangWeight) -> Vec<(f64, f64)> {
    stats
        .values()
        .filter(|s| s.oh_count > 0)
        .map(|s| {
            let w = match weight {
                OverhangWeight::Length => s.len as f64 / 100.0,
                OverhangWeight::Score => s.score as f64 / 100.0,
            };
            (s.overhang as f64, w)
        })
        .collect()
}

/// Minimum identity: `median - k * 1.4826 * MAD`.
pub fn identity_threshold(stats: &StatsMap, k: f64) -> Option<Threshold<f64>> {
    let estimate = median_absolute_deviation(&identity_sample(stats))?;
    Some(Threshold {
        value: estimate.median - k * MAD_SCALE * estimate.mad,
        estimate,
    })
}

/// Maximum overhang: `median + k * 1.4826 * MAD`, truncated.
pub fn overhang_threshold(stats: &StatsMap, k: f64, weight: OverhangWeight) -> Option<Threshold<i64>> {
    let estimate = median_absolute_deviation(&overhang_sample(stats, weight))?;
    Some(Threshold {
        value: (estimate.median + k * MAD_SCALE * estimate.mad) as i64,
        estimate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ReadStatInfo;

    #[test]
    fn test_weighted_median() {
        let samples = [(1.0, 1.0), (2.0, 1.0), (10.0, 5.0)];
        assert_eq!(weighted_median(&samples), Some(10.0));
        let samples = [(3.0, 1.0), (1.0, 1.0), (2.0, 1.0)];
        assert_eq!(weighted_median(&samples), Some(2.0));
        assert_eq!(weighted_median(&[]), None);
        assert_eq!(weighted_median(&[(f64::NAN, 1.0), (4.0, 0.0)]), None);
    }

    #[test]
    fn test_mad_resists_outliers() {
        let mut samples: Vec<(f64, f64)> = (0..99).map(|i| (95.0 + (i % 3) as f64, 1.0)).collect();
        samples.push((10.0, 1.0));
        let est = median_absolute_deviation(&samples).unwrap();
        assert_eq!(est.median, 96.0);
        assert_eq!(est.mad, 1.0);
        assert_eq!(est.samples, 100);
    }

    #[test]
    fn test_degenerate_sample_has_no_threshold() {
        assert!(median_absolute_deviation(&[(1.0, 1.0), (2.0, 1.0)]).is_none());

        let stats = StatsMap::new();
        assert!(identity_threshold(&stats, 3.0).is_none());
        assert!(overhang_threshold(&stats, 3.0, OverhangWeight::Score).is_none());
    }

    #[test]
    fn test_overhang_sample_skips_unmeasured() {
        let mut stats = StatsMap::new();
        for (id, overhang, oh_count) in [(0, 40, 2), (1, -1, 0), (2, 10, 1)] {
            stats.insert(id, ReadStatInfo {
                identity: 90.0,
                score: 1000,
                len: 5000,
                aligned: 4000,
                count: 2,
                overhang,
                oh_count,
            });
        }
        let mut sample = overhang_sample(&stats, OverhangWeight::Length);
        sample.sort_by(|x, y| x.0.total_cmp(&y.0));
        assert_eq!(sample, vec![(10.0, 50.0), (40.0, 50.0)]);
    }
}
