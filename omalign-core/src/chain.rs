//! Chaining of alignment segments
//!
//! Picks a maximum-weight chain of collinear segments with a quadratic
//! dynamic program over segments sorted by their endpoint site ids.

use std::cmp::Ordering;

use crate::segment::AlignmentSegment;
use crate::types::Strand;

#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentChainer;

impl SegmentChainer {
    pub fn new() -> Self {
        Self
    }

    /// Best chain of `segments`, in chain order. Empty segments are ignored.
    pub fn chain(&self, segments: Vec<AlignmentSegment>, strand: Strand) -> Vec<AlignmentSegment> {
        let mut segments: Vec<AlignmentSegment> = segments.into_iter().filter(|s| !s.is_empty()).collect();
        if segments.len() <= 1 {
            return segments;
        }

        segments.sort_by_key(|segment| segment.endpoint_sum(strand));

        let n = segments.len();
        let mut dp_score = vec![0.0f64; n];
        let mut dp_parent = vec![None::<usize>; n];

        for i in 0..n {
            let mut best_link = 0.0;
            for j in 0..i {
                let link = consecutiveness(&segments[j], &segments[i], strand);
                if link == f64::NEG_INFINITY {
                    continue;
                }
                let candidate = dp_score[j] + link;
                if candidate > best_link {
                    best_link = candidate;
                    dp_parent[i] = Some(j);
                }
            }
            dp_score[i] = segments[i].segment_score + best_link;
        }

        let Some(end) = (0..n).max_by(|&a, &b| {
            dp_score[a]
                .partial_cmp(&dp_score[b])
                .unwrap_or(Ordering::Equal)
                .then(b.cmp(&a))
        }) else {
            return Vec::new();
        };

        let mut chain_indices = Vec::new();
        let mut current = Some(end);
        while let Some(idx) = current {
            chain_indices.push(idx);
            current = dp_parent[idx];
        }
        chain_indices.reverse();

        let mut slots: Vec<Option<AlignmentSegment>> = segments.into_iter().map(Some).collect();
        chain_indices
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect()
    }
}

/// Link score of `current` following `previous`.
///
/// Forbidden (negative infinity) when the gap on either axis eats more than
/// half of the shorter segment; otherwise penalises unequal spacing and
/// overlap, and rewards collinear continuations.
pub fn consecutiveness(previous: &AlignmentSegment, current: &AlignmentSegment, strand: Strand) -> f64 {
    let (Some(prev_start), Some(prev_end), Some(curr_start), Some(curr_end)) = (
        previous.first_pair(),
        previous.last_pair(),
        current.first_pair(),
        current.last_pair(),
    ) else {
        return f64::NEG_INFINITY;
    };

    let reference_distance = curr_start.reference.site_id as i64 - prev_end.reference.site_id as i64;
    let query_distance = curr_start.oriented_query_site(strand) - prev_end.oriented_query_site(strand);

    let reference_length = (prev_end.reference.site_id as i64 - prev_start.reference.site_id as i64)
        .min(curr_end.reference.site_id as i64 - curr_start.reference.site_id as i64);
    let query_length = (prev_end.oriented_query_site(strand) - prev_start.oriented_query_site(strand))
        .min(curr_end.oriented_query_site(strand) - curr_start.oriented_query_site(strand));

    if (reference_length + 2 * reference_distance).min(query_length + 2 * query_distance) < 0 {
        return f64::NEG_INFINITY;
    }

    let sum = (reference_distance + query_distance) as f64;
    let diff = (reference_distance - query_distance) as f64;
    -(sum * sum + diff * diff) / sum.abs().max(diff.abs()).max(1.0)
}
