//! Maximum-scoring runs of scored positions.

use std::collections::HashSet;
use std::ops::Range;

use crate::correlate::Peak;
use crate::pairs::{AlignedPair, AlignmentPosition};
use crate::scoring::ScoredPosition;
use crate::types::Strand;

/// A contiguous run of scored positions that starts and ends with an
/// aligned pair, together with the seed it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentSegment {
    pub positions: Vec<ScoredPosition>,
    pub segment_score: f64,
    pub peak: Peak,
}

impl AlignmentSegment {
    /// Build a segment, dropping unpaired labels at both ends.
    pub fn new(positions: Vec<ScoredPosition>, peak: Peak) -> Self {
        let first = positions.iter().position(ScoredPosition::is_aligned);
        let last = positions.iter().rposition(ScoredPosition::is_aligned);

        let positions = match (first, last) {
            (Some(first), Some(last)) => positions[first..=last].to_vec(),
            _ => Vec::new(),
        };
        let segment_score = positions.iter().map(|p| p.score).sum();

        Self {
            positions,
            segment_score,
            peak,
        }
    }

    pub fn empty(peak: Peak) -> Self {
        Self {
            positions: Vec::new(),
            segment_score: 0.0,
            peak,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn aligned_pairs(&self) -> impl Iterator<Item = &AlignedPair> + '_ {
        self.positions.iter().filter_map(|p| p.position.as_pair())
    }

    pub fn pair_count(&self) -> usize {
        self.aligned_pairs().count()
    }

    pub fn first_pair(&self) -> Option<&AlignedPair> {
        self.positions.first().and_then(|p| p.position.as_pair())
    }

    pub fn last_pair(&self) -> Option<&AlignedPair> {
        self.positions.last().and_then(|p| p.position.as_pair())
    }

    /// A new segment made of `range` of this one's positions.
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self::new(self.positions[range].to_vec(), self.peak)
    }

    pub fn reference_sites(&self) -> HashSet<usize> {
        self.aligned_pairs().map(|p| p.reference.site_id).collect()
    }

    pub fn query_sites(&self) -> HashSet<usize> {
        self.aligned_pairs().map(|p| p.query.site_id).collect()
    }

    /// True if both segments pair the same reference or query label.
    pub fn shares_sites(&self, other: &AlignmentSegment) -> bool {
        let reference = self.reference_sites();
        let query = self.query_sites();
        other
            .aligned_pairs()
            .any(|p| reference.contains(&p.reference.site_id) || query.contains(&p.query.site_id))
    }

    /// Sum of the endpoint site ids, the chaining sort key.
    pub fn endpoint_sum(&self, strand: Strand) -> i64 {
        match (self.first_pair(), self.last_pair()) {
            (Some(first), Some(last)) => {
                first.reference.site_id as i64
                    + first.oriented_query_site(strand)
                    + last.reference.site_id as i64
                    + last.oriented_query_site(strand)
            }
            _ => 0,
        }
    }

    /// Map every pair and unpaired position through `f`.
    pub fn map_positions(&self, f: impl Fn(AlignmentPosition) -> AlignmentPosition) -> Self {
        let positions = self
            .positions
            .iter()
            .map(|p| ScoredPosition {
                position: f(p.position),
                score: p.score,
            })
            .collect();
        Self::new(positions, self.peak)
    }
}

/// Kadane-style extraction with a reset once the running score falls more
/// than `break_segment_threshold` below the best score of the current run.
#[derive(Debug, Clone, Copy)]
pub struct SegmentExtractor {
    min_score: f64,
    break_segment_threshold: f64,
}

impl SegmentExtractor {
    pub fn new(min_score: f64, break_segment_threshold: f64) -> Self {
        Self {
            min_score,
            break_segment_threshold,
        }
    }

    pub fn extract(&self, positions: &[ScoredPosition], peak: &Peak) -> Vec<AlignmentSegment> {
        let mut segments = Vec::new();
        let mut start = 0;
        let mut end = 0;
        let mut current = 0.0;
        let mut best: Option<(Range<usize>, f64)> = None;

        while end < positions.len() {
            current += positions[end].score;
            let best_score = best.as_ref().map_or(0.0, |(_, score)| *score);

            if current > (best_score - self.break_segment_threshold).max(0.0) {
                end += 1;
                if current > best_score {
                    best = Some((start..end, current));
                }
            } else {
                if let Some(segment) = self.emit(positions, best.take(), peak) {
                    segments.push(segment);
                }
                end += 1;
                start = end;
                current = 0.0;
            }
        }

        if let Some(segment) = self.emit(positions, best, peak) {
            segments.push(segment);
        }

        segments
    }

    fn emit(
        &self,
        positions: &[ScoredPosition],
        best: Option<(Range<usize>, f64)>,
        peak: &Peak,
    ) -> Option<AlignmentSegment> {
        let (range, score) = best?;
        if score < self.min_score {
            return None;
        }
        let segment = AlignmentSegment::new(positions[range].to_vec(), *peak);
        (!segment.is_empty()).then_some(segment)
    }
}
