//! Trimming of overlaps between chained segments.

use crate::pairs::AlignedPair;
use crate::scoring::ScoredPosition;
use crate::segment::AlignmentSegment;
use crate::types::Strand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Reference,
    Query,
}

impl Axis {
    fn other(self) -> Self {
        match self {
            Axis::Reference => Axis::Query,
            Axis::Query => Axis::Reference,
        }
    }

    fn key(self, pair: &AlignedPair, strand: Strand) -> i64 {
        match self {
            Axis::Reference => pair.reference.site_id as i64,
            Axis::Query => pair.oriented_query_site(strand),
        }
    }
}

/// Resolves overlaps between consecutive segments of a chain so that no
/// two surviving segments pair the same reference or query label.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, chain: Vec<AlignmentSegment>, strand: Strand) -> Vec<AlignmentSegment> {
        let mut resolved: Vec<AlignmentSegment> = Vec::with_capacity(chain.len());

        for segment in chain.into_iter().filter(|s| !s.is_empty()) {
            let mut next = segment;

            while let Some(previous) = resolved.pop() {
                if !self.conflicts(&previous, &next, strand) {
                    resolved.push(previous);
                    break;
                }

                let (mut previous, mut trimmed) = self.resolve_pair(previous, next, strand);
                if !previous.is_empty() && !trimmed.is_empty() && self.conflicts(&previous, &trimmed, strand) {
                    // Trimming did not separate them; keep the stronger one
                    if previous.segment_score >= trimmed.segment_score {
                        trimmed = AlignmentSegment::empty(trimmed.peak);
                    } else {
                        previous = AlignmentSegment::empty(previous.peak);
                    }
                }
                next = trimmed;

                if !previous.is_empty() {
                    resolved.push(previous);
                    break;
                }
                if next.is_empty() {
                    break;
                }
            }

            if !next.is_empty() {
                resolved.push(next);
            }
        }

        drop_shared_sites(resolved)
    }

    /// True when some pair of `later` does not lie strictly after every pair
    /// of `earlier` on either axis.
    pub fn conflicts(&self, earlier: &AlignmentSegment, later: &AlignmentSegment, strand: Strand) -> bool {
        [Axis::Reference, Axis::Query]
            .into_iter()
            .any(|axis| overlap_on(earlier, later, axis, strand))
    }

    fn resolve_pair(
        &self,
        earlier: AlignmentSegment,
        later: AlignmentSegment,
        strand: Strand,
    ) -> (AlignmentSegment, AlignmentSegment) {
        let primary = if earlier.peak.position > later.peak.position {
            Axis::Query
        } else {
            Axis::Reference
        };

        let (mut earlier, mut later) = (earlier, later);
        for axis in [primary, primary.other()] {
            if earlier.is_empty() || later.is_empty() {
                break;
            }
            if overlap_on(&earlier, &later, axis, strand) {
                (earlier, later) = split_overlap(earlier, later, axis, strand);
            }
        }
        (earlier, later)
    }
}

fn overlap_on(earlier: &AlignmentSegment, later: &AlignmentSegment, axis: Axis, strand: Strand) -> bool {
    let earlier_max = earlier.aligned_pairs().map(|p| axis.key(p, strand)).max();
    let later_min = later.aligned_pairs().map(|p| axis.key(p, strand)).min();
    match (earlier_max, later_min) {
        (Some(earlier_max), Some(later_min)) => later_min <= earlier_max,
        _ => false,
    }
}

/// Split the overlapping tail of `earlier` and head of `later` along `axis`.
///
/// With the same number of pairs on both sides, the split point maximises
/// the kept score. Otherwise the lower-scoring overlap is removed from its
/// owner.
fn split_overlap(
    earlier: AlignmentSegment,
    later: AlignmentSegment,
    axis: Axis,
    strand: Strand,
) -> (AlignmentSegment, AlignmentSegment) {
    let later_min = later.aligned_pairs().map(|p| axis.key(p, strand)).min().unwrap_or(i64::MAX);
    let earlier_max = earlier.aligned_pairs().map(|p| axis.key(p, strand)).max().unwrap_or(i64::MIN);

    // Tail of `earlier` from its first pair at or past the head of `later`
    let earlier_cut = earlier
        .positions
        .iter()
        .position(|p| p.position.as_pair().is_some_and(|pair| axis.key(pair, strand) >= later_min))
        .unwrap_or(earlier.positions.len());
    // Head of `later` up to its last pair at or before the tail of `earlier`
    let later_cut = later
        .positions
        .iter()
        .rposition(|p| p.position.as_pair().is_some_and(|pair| axis.key(pair, strand) <= earlier_max))
        .map_or(0, |i| i + 1);

    let earlier_overlap = &earlier.positions[earlier_cut..];
    let later_overlap = &later.positions[..later_cut];

    let earlier_pairs = pair_indices(earlier_overlap);
    let later_pairs = pair_indices(later_overlap);

    if earlier_pairs.len() == later_pairs.len() {
        let n = earlier_pairs.len();
        let mut best_k = n;
        let mut best_score = f64::NEG_INFINITY;

        // Keep the first `k` overlap pairs of `earlier` and the last `n - k` of `later`
        for k in (0..=n).rev() {
            let earlier_end = if k == 0 { 0 } else { earlier_pairs[k - 1] + 1 };
            let later_start = if k == n { later_overlap.len() } else { later_pairs[k] };
            let kept: f64 = earlier_overlap[..earlier_end].iter().map(|p| p.score).sum::<f64>()
                + later_overlap[later_start..].iter().map(|p| p.score).sum::<f64>();
            if kept > best_score {
                best_score = kept;
                best_k = k;
            }
        }

        let earlier_end = if best_k == 0 { 0 } else { earlier_pairs[best_k - 1] + 1 };
        let later_start = if best_k == n { later_overlap.len() } else { later_pairs[best_k] };

        let trimmed_earlier = earlier.slice(0..earlier_cut + earlier_end);
        let trimmed_later = later.slice(later_start..later.positions.len());
        return (trimmed_earlier, trimmed_later);
    }

    let earlier_overlap_score: f64 = earlier_overlap.iter().map(|p| p.score).sum();
    let later_overlap_score: f64 = later_overlap.iter().map(|p| p.score).sum();

    if earlier_overlap_score < later_overlap_score {
        let trimmed = earlier.slice(0..earlier_cut);
        (trimmed, later)
    } else {
        let trimmed = later.slice(later_cut..later.positions.len());
        (earlier, trimmed)
    }
}

fn pair_indices(positions: &[ScoredPosition]) -> Vec<usize> {
    positions
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.is_aligned().then_some(i))
        .collect()
}

/// Drop the lower-scoring segment of every pair that still shares a label.
fn drop_shared_sites(mut segments: Vec<AlignmentSegment>) -> Vec<AlignmentSegment> {
    let mut keep = vec![true; segments.len()];
    for i in 0..segments.len() {
        for j in i + 1..segments.len() {
            if !keep[i] || !keep[j] || !segments[i].shares_sites(&segments[j]) {
                continue;
            }
            if segments[i].segment_score >= segments[j].segment_score {
                keep[j] = false;
            } else {
                keep[i] = false;
            }
        }
    }

    let mut flags = keep.into_iter();
    segments.retain(|_| flags.next().unwrap_or(false));
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::Peak;
    use crate::pairs::AlignmentPosition;
    use crate::types::PositionWithSiteId;

    fn segment(sites: &[(usize, usize, f64)], peak: i64) -> AlignmentSegment {
        let positions = sites
            .iter()
            .map(|&(r, q, score)| ScoredPosition {
                position: AlignmentPosition::Aligned(AlignedPair::new(
                    PositionWithSiteId::new(r, r as i64 * 1_000),
                    PositionWithSiteId::new(q, q as i64 * 1_000),
                    0,
                )),
                score,
            })
            .collect();
        AlignmentSegment::new(positions, Peak::at(peak))
    }

    fn sites(segment: &AlignmentSegment) -> Vec<(usize, usize)> {
        segment
            .aligned_pairs()
            .map(|p| (p.reference.site_id, p.query.site_id))
            .collect()
    }

    #[test]
    fn test_disjoint_segments_untouched() {
        let a = segment(&[(1, 1, 800.0), (2, 2, 800.0)], 0);
        let b = segment(&[(3, 3, 800.0), (4, 4, 800.0)], 0);
        let resolved = ConflictResolver::new().resolve(vec![a.clone(), b.clone()], Strand::Forward);
        assert_eq!(resolved, vec![a, b]);
    }

    #[test]
    fn test_equal_overlap_split_keeps_best_scores() {
        let a = segment(&[(1, 1, 800.0), (2, 2, 800.0), (3, 3, 100.0)], 0);
        let b = segment(&[(3, 3, 700.0), (4, 4, 800.0)], 0);
        let resolved = ConflictResolver::new().resolve(vec![a, b], Strand::Forward);

        assert_eq!(resolved.len(), 2);
        assert_eq!(sites(&resolved[0]), vec![(1, 1), (2, 2)]);
        assert_eq!(sites(&resolved[1]), vec![(3, 3), (4, 4)]);
        assert_eq!(resolved[0].segment_score, 1_600.0);
        assert_eq!(resolved[1].segment_score, 1_500.0);
    }

    #[test]
    fn test_unequal_overlap_trims_lower_side() {
        let a = segment(&[(1, 1, 800.0), (2, 2, 800.0), (3, 3, 800.0), (4, 4, 800.0)], 0);
        // Two pairs of `b` overlap three pairs of `a` on the reference
        let b = segment(&[(2, 5, 100.0), (4, 6, 100.0), (7, 7, 800.0), (8, 8, 800.0)], 0);
        let resolved = ConflictResolver::new().resolve(vec![a.clone(), b], Strand::Forward);

        assert_eq!(resolved.len(), 2);
        assert_eq!(sites(&resolved[0]), sites(&a));
        assert_eq!(sites(&resolved[1]), vec![(7, 7), (8, 8)]);
    }

    #[test]
    fn test_no_shared_sites_after_resolution() {
        let a = segment(&[(1, 1, 800.0), (2, 2, 800.0), (3, 3, 800.0)], 0);
        let b = segment(&[(2, 2, 800.0), (3, 3, 800.0), (4, 4, 800.0)], 0);
        let c = segment(&[(3, 3, 800.0), (5, 5, 800.0)], 0);
        let resolved = ConflictResolver::new().resolve(vec![a, b, c], Strand::Forward);

        for (i, x) in resolved.iter().enumerate() {
            for y in &resolved[i + 1..] {
                assert!(!x.shares_sites(y));
            }
            assert!(!x.is_empty());
        }
    }

    #[test]
    fn test_query_axis_when_peaks_out_of_order() {
        let a = segment(&[(1, 1, 800.0), (2, 2, 800.0)], 5_000);
        let b = segment(&[(3, 2, 800.0), (4, 4, 800.0)], 1_000);
        let resolved = ConflictResolver::new().resolve(vec![a, b], Strand::Forward);

        assert_eq!(resolved.len(), 2);
        let total: usize = resolved.iter().map(AlignmentSegment::pair_count).sum();
        assert_eq!(total, 3);
        assert!(!resolved[0].shares_sites(&resolved[1]));
    }
}
