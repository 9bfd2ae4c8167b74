//! Summary statistics over a set of alignment records.

use serde::{Deserialize, Serialize};

use crate::record::AlignmentRecord;
use crate::types::Strand;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordStats {
    pub total_records: u64,
    pub total_aligned_pairs: u64,
    pub mean_confidence: f64,
    pub median_confidence: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
    pub forward_count: u64,
    pub reverse_count: u64,
    /// Records that took part in a residual (second pass or joined) alignment
    pub residual_count: u64,
    pub mean_query_coverage: f64,
}

impl RecordStats {
    pub fn compute<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AlignmentRecord>,
    {
        let mut total_records = 0u64;
        let mut total_aligned_pairs = 0u64;
        let mut confidences = Vec::new();
        let mut forward_count = 0u64;
        let mut reverse_count = 0u64;
        let mut residual_count = 0u64;
        let mut coverage_sum = 0.0;

        for record in records {
            total_records += 1;
            total_aligned_pairs += record.segments.iter().map(|s| s.pair_count() as u64).sum::<u64>();
            confidences.push(record.confidence);
            coverage_sum += record.query_coverage();

            match record.strand {
                Strand::Forward => forward_count += 1,
                Strand::Reverse => reverse_count += 1,
            }
            if record.aligned_from_residual {
                residual_count += 1;
            }
        }

        if confidences.is_empty() {
            return Self {
                total_records: 0,
                total_aligned_pairs: 0,
                mean_confidence: 0.0,
                median_confidence: 0.0,
                min_confidence: 0.0,
                max_confidence: 0.0,
                forward_count: 0,
                reverse_count: 0,
                residual_count: 0,
                mean_query_coverage: 0.0,
            };
        }

        confidences.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mean_confidence = confidences.iter().sum::<f64>() / confidences.len() as f64;
        let mid = confidences.len() / 2;
        let median_confidence = if confidences.len() % 2 == 0 {
            (confidences[mid - 1] + confidences[mid]) / 2.0
        } else {
            confidences[mid]
        };

        Self {
            total_records,
            total_aligned_pairs,
            mean_confidence,
            median_confidence,
            min_confidence: confidences[0],
            max_confidence: confidences[confidences.len() - 1],
            forward_count,
            reverse_count,
            residual_count,
            mean_query_coverage: coverage_sum / total_records as f64,
        }
    }

    /// Fraction of forward strand records.
    pub fn strand_balance(&self) -> f64 {
        if self.total_records == 0 {
            0.0
        } else {
            self.forward_count as f64 / self.total_records as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::Peak;
    use crate::pairs::{AlignedPair, AlignmentPosition};
    use crate::scoring::ScoredPosition;
    use crate::segment::AlignmentSegment;
    use crate::types::{OpticalMap, PositionWithSiteId};

    fn record(strand: Strand, pairs: usize, residual: bool) -> AlignmentRecord {
        let positions: Vec<i64> = (0..pairs as i64).map(|i| i * 100).collect();
        let reference = OpticalMap::new(1, 10_000, positions.clone()).unwrap();
        let query = OpticalMap::new(2, 1_000, positions.clone()).unwrap();
        let scored = positions
            .iter()
            .enumerate()
            .map(|(i, &p)| ScoredPosition {
                position: AlignmentPosition::Aligned(AlignedPair::new(
                    PositionWithSiteId::new(i + 1, p),
                    PositionWithSiteId::new(i + 1, p),
                    0,
                )),
                score: 800.0,
            })
            .collect();
        let segment = AlignmentSegment::new(scored, Peak::at(0));
        let mut record = AlignmentRecord::from_segments(&reference, &query, strand, vec![segment]).unwrap();
        record.aligned_from_residual = residual;
        record
    }

    #[test]
    fn test_empty() {
        let stats = RecordStats::compute(&[]);
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.strand_balance(), 0.0);
    }

    #[test]
    fn test_counts_and_confidence() {
        let records = vec![
            record(Strand::Forward, 2, false),
            record(Strand::Forward, 4, true),
            record(Strand::Reverse, 3, false),
        ];
        let stats = RecordStats::compute(&records);

        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.total_aligned_pairs, 9);
        assert_eq!((stats.forward_count, stats.reverse_count), (2, 1));
        assert_eq!(stats.residual_count, 1);
        assert_eq!(stats.min_confidence, 1_600.0);
        assert_eq!(stats.median_confidence, 2_400.0);
        assert_eq!(stats.max_confidence, 3_200.0);
        assert_eq!(stats.mean_confidence, 2_400.0);
    }
}
