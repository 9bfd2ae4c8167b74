//! One-dimensional peak finding over correlation signals.
//!
//! Semantics follow the usual signal-processing definition: a peak is a
//! strict local maximum (plateaus count once, at their middle), filtered by
//! height, then by minimum separation, then by prominence.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::types::Position;

/// A candidate reference offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Reference coordinate, in bp, where the query start is placed
    pub position: Position,
    pub height: f64,
    pub left_base: usize,
    pub right_base: usize,
    /// Prominence of the peak above its higher base
    pub score: f64,
}

impl Peak {
    /// A peak placed by hand, without a correlation behind it.
    pub fn at(position: Position) -> Self {
        Self {
            position,
            height: 0.0,
            left_base: 0,
            right_base: 0,
            score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakPolicy {
    pub height_threshold: f64,
    /// Minimum index distance between two returned peaks
    pub min_distance: usize,
    pub prominence: f64,
    pub max_count: usize,
}

/// A peak addressed by its index in the signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedPeak {
    pub index: usize,
    pub height: f64,
    pub left_base: usize,
    pub right_base: usize,
    pub prominence: f64,
}

impl IndexedPeak {
    pub fn into_peak(self, position: Position) -> Peak {
        Peak {
            position,
            height: self.height,
            left_base: self.left_base,
            right_base: self.right_base,
            score: self.prominence,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PeakFinder {
    policy: PeakPolicy,
}

impl PeakFinder {
    pub fn new(policy: PeakPolicy) -> Self {
        Self { policy }
    }

    /// Peaks of `values`, highest first, at most `max_count` of them.
    pub fn find(&self, values: &[f64]) -> Vec<IndexedPeak> {
        let candidates: Vec<usize> = candidate_indices(values)
            .into_iter()
            .filter(|&i| values[i] >= self.policy.height_threshold)
            .collect();

        let candidates = select_by_distance(values, candidates, self.policy.min_distance);

        let mut peaks: Vec<IndexedPeak> = candidates
            .into_iter()
            .map(|index| {
                let (prominence, left_base, right_base) = prominence(values, index);
                IndexedPeak {
                    index,
                    height: values[index],
                    left_base,
                    right_base,
                    prominence,
                }
            })
            .filter(|peak| peak.prominence >= self.policy.prominence)
            .collect();

        peaks.sort_by(|a, b| by_height_desc(a.height, a.index, b.height, b.index));
        peaks.truncate(self.policy.max_count);
        peaks
    }
}

fn by_height_desc(a_height: f64, a_index: usize, b_height: f64, b_index: usize) -> Ordering {
    b_height
        .partial_cmp(&a_height)
        .unwrap_or(Ordering::Equal)
        .then(a_index.cmp(&b_index))
}

/// Local maxima of `values`. A signal of one or two elements has no
/// interior, so its maximum stands in; this is the case of a query exactly
/// as long as the reference.
fn candidate_indices(values: &[f64]) -> Vec<usize> {
    if values.len() >= 3 {
        return local_maxima(values);
    }
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal).then(b.0.cmp(&a.0)))
        .map(|(i, _)| i)
        .into_iter()
        .collect()
}

/// Indices of strict local maxima. A flat top is reported once, at its
/// middle element; the first and last elements are never maxima.
pub fn local_maxima(values: &[f64]) -> Vec<usize> {
    let mut maxima = Vec::new();
    if values.len() < 3 {
        return maxima;
    }

    let last = values.len() - 1;
    let mut i = 1;
    while i < last {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < last && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                maxima.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    maxima
}

/// Drop every peak that lies closer than `min_distance` to a higher one.
fn select_by_distance(values: &[f64], peaks: Vec<usize>, min_distance: usize) -> Vec<usize> {
    if min_distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| by_height_desc(values[peaks[a]], peaks[a], values[peaks[b]], peaks[b]));

    let mut keep = vec![true; peaks.len()];
    for &j in &order {
        if !keep[j] {
            continue;
        }
        for k in (0..j).rev() {
            if peaks[j] - peaks[k] >= min_distance {
                break;
            }
            keep[k] = false;
        }
        for k in j + 1..peaks.len() {
            if peaks[k] - peaks[j] >= min_distance {
                break;
            }
            keep[k] = false;
        }
    }

    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(peak, kept)| kept.then_some(peak))
        .collect()
}

/// Prominence of the peak at `index` with its left and right bases.
///
/// Each valley is the minimum reached before the signal rises above the
/// peak (or hits the border).
pub fn prominence(values: &[f64], index: usize) -> (f64, usize, usize) {
    let height = values[index];

    let mut left_base = index;
    let mut left_min = height;
    for j in (0..=index).rev() {
        if values[j] > height {
            break;
        }
        if values[j] < left_min {
            left_min = values[j];
            left_base = j;
        }
    }

    let mut right_base = index;
    let mut right_min = height;
    for (j, &value) in values.iter().enumerate().skip(index) {
        if value > height {
            break;
        }
        if value < right_min {
            right_min = value;
            right_base = j;
        }
    }

    (height - left_min.max(right_min), left_base, right_base)
}
