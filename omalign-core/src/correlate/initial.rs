//! Coarse seeding over whole molecules.

use super::peaks::{PeakFinder, PeakPolicy};
use super::vector::Vectoriser;
use super::{max_value, median, normalise, Correlation, CorrelationEngine};
use crate::error::AlignResult;
use crate::params::AlignmentParams;
use crate::types::{OpticalMap, Position, Strand};

/// Share of the best normalised correlation a seed must reach.
const SEED_HEIGHT_RATIO: f64 = 0.75;

pub struct InitialAligner {
    vectoriser: Vectoriser,
    min_distance: usize,
    peaks_count: usize,
}

impl InitialAligner {
    pub fn new(params: &AlignmentParams) -> AlignResult<Self> {
        Ok(Self {
            vectoriser: Vectoriser::new(params.primary_resolution, params.primary_blur)?,
            min_distance: params.primary_min_distance(),
            peaks_count: params.peaks_count,
        })
    }

    /// Seed correlations for both orientations. Only orientations that
    /// produced at least one peak are returned.
    pub fn align<'a>(
        &self,
        engine: &mut CorrelationEngine,
        reference: &'a OpticalMap,
        query: &'a OpticalMap,
    ) -> Vec<Correlation<'a>> {
        if query.length() > reference.length() {
            return Vec::new();
        }

        let reference_vector = self.vectoriser.vectorise_map(reference);
        let query_vector = self.vectoriser.vectorise_map(query);

        Strand::BOTH
            .into_iter()
            .map(|strand| {
                let oriented: Vec<u8> = match strand {
                    Strand::Forward => query_vector.clone(),
                    Strand::Reverse => query_vector.iter().rev().copied().collect(),
                };
                self.correlate(engine, reference, query, &reference_vector, &oriented, strand)
            })
            .filter(|correlation| !correlation.peaks.is_empty())
            .collect()
    }

    fn correlate<'a>(
        &self,
        engine: &mut CorrelationEngine,
        reference: &'a OpticalMap,
        query: &'a OpticalMap,
        reference_vector: &[u8],
        query_vector: &[u8],
        strand: Strand,
    ) -> Correlation<'a> {
        let raw = engine.correlate(reference_vector, query_vector);
        let values = normalise(reference_vector, query_vector, &raw);

        let best = max_value(&values);
        let peaks = if best > 0.0 {
            let finder = PeakFinder::new(PeakPolicy {
                height_threshold: SEED_HEIGHT_RATIO * best,
                min_distance: self.min_distance,
                prominence: 0.0,
                max_count: self.peaks_count,
            });
            let resolution = Position::from(self.vectoriser.resolution());
            finder
                .find(&values)
                .into_iter()
                .map(|peak| peak.into_peak(peak.index as Position * resolution))
                .collect()
        } else {
            Vec::new()
        };

        let noise_level = median(&values);
        Correlation {
            values,
            reference,
            query,
            strand,
            resolution: self.vectoriser.resolution(),
            blur_radius: self.vectoriser.blur_radius(),
            window_start: 0,
            window_end: reference.vector_end(),
            peaks,
            noise_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AlignmentParams {
        AlignmentParams {
            primary_resolution: 100,
            primary_blur: 0,
            min_peak_distance: 500,
            ..Default::default()
        }
    }

    #[test]
    fn test_forward_seed_at_true_offset() {
        let reference =
            OpticalMap::new(1, 10_000, vec![500, 1_200, 1_500, 2_900, 4_000, 4_300, 6_100, 8_800])
                .unwrap();
        // Labels 2..=5 of the reference, shifted so the query starts at 1_000
        let query = OpticalMap::new(2, 3_100, vec![200, 500, 1_900, 3_000]).unwrap();

        let aligner = InitialAligner::new(&params()).unwrap();
        let mut engine = CorrelationEngine::new();
        let correlations = aligner.align(&mut engine, &reference, &query);

        let forward = correlations
            .iter()
            .find(|c| c.strand == Strand::Forward)
            .expect("forward correlation");
        assert_eq!(forward.best_peak().map(|p| p.position), Some(1_000));
        assert_eq!(forward.max_value(), 1.0);
    }

    #[test]
    fn test_query_as_long_as_reference() {
        let positions = vec![500, 1_200, 1_500, 2_900, 4_000, 4_300, 6_100, 8_800];
        let reference = OpticalMap::new(1, 10_000, positions.clone()).unwrap();
        let query = OpticalMap::new(2, 10_000, positions).unwrap();

        let aligner = InitialAligner::new(&params()).unwrap();
        let mut engine = CorrelationEngine::new();
        let correlations = aligner.align(&mut engine, &reference, &query);

        let forward = correlations
            .iter()
            .find(|c| c.strand == Strand::Forward)
            .expect("forward correlation");
        assert_eq!(forward.values.len(), 1);
        assert_eq!(forward.best_peak().map(|p| p.position), Some(0));
    }

    #[test]
    fn test_query_longer_than_reference() {
        let reference = OpticalMap::new(1, 1_000, vec![100, 500]).unwrap();
        let query = OpticalMap::new(2, 5_000, vec![100, 500]).unwrap();
        let aligner = InitialAligner::new(&params()).unwrap();
        let mut engine = CorrelationEngine::new();
        assert!(aligner.align(&mut engine, &reference, &query).is_empty());
    }
}
