//! High-resolution re-correlation around one seed.

use super::peaks::{Peak, PeakFinder, PeakPolicy};
use super::vector::Vectoriser;
use super::{max_value, median, Correlation, CorrelationEngine};
use crate::error::AlignResult;
use crate::params::AlignmentParams;
use crate::types::{OpticalMap, Position, Strand};

/// Prominence floor of a refined peak, as a share of the window maximum.
const REFINE_PROMINENCE_RATIO: f64 = 0.05;

pub struct Refiner {
    vectoriser: Vectoriser,
    margin: Position,
    height_threshold: f64,
}

impl Refiner {
    pub fn new(params: &AlignmentParams) -> AlignResult<Self> {
        Ok(Self {
            vectoriser: Vectoriser::new(params.secondary_resolution, params.secondary_blur)?,
            margin: params.secondary_margin,
            height_threshold: params.peak_height_threshold,
        })
    }

    /// Correlate the query against `[seed - margin, seed + length + margin)`.
    ///
    /// On the reverse strand the query is vectorised from its mirrored
    /// positions, the frame the pair aligner works in. The returned peak
    /// positions are absolute reference coordinates.
    pub fn refine<'a>(
        &self,
        engine: &mut CorrelationEngine,
        reference: &'a OpticalMap,
        query: &'a OpticalMap,
        seed: &Peak,
        strand: Strand,
    ) -> Correlation<'a> {
        let window_start = seed.position - self.margin;
        let window_end = seed.position + query.length() + self.margin;

        let reference_vector = self
            .vectoriser
            .vectorise(reference.positions(), window_start, window_end);

        let query_positions: Vec<Position> = query.sites(strand).iter().map(|s| s.position).collect();
        let query_vector = self
            .vectoriser
            .vectorise(&query_positions, 0, query.vector_end());

        let values = engine.correlate(&reference_vector, &query_vector);
        let best = max_value(&values);

        let peaks = if best > 0.0 {
            let finder = PeakFinder::new(PeakPolicy {
                height_threshold: self.height_threshold,
                min_distance: 1,
                prominence: REFINE_PROMINENCE_RATIO * best,
                max_count: 1,
            });
            let resolution = Position::from(self.vectoriser.resolution());
            finder
                .find(&values)
                .into_iter()
                .map(|peak| peak.into_peak(window_start + peak.index as Position * resolution))
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
            window_start,
            window_end,
            peaks,
            noise_level,
        }
    }
}
