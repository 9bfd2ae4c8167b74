//! Tuning parameters for the whole alignment pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{AlignError, AlignResult};
use crate::types::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentParams {
    /// Base pairs per element of the seeding vectors
    pub primary_resolution: u32,
    /// Blur radius, in elements, of the seeding vectors
    pub primary_blur: u32,
    /// Maximum number of seed peaks per orientation
    pub peaks_count: usize,
    /// Minimum distance between two seed peaks, in bp
    pub min_peak_distance: Position,
    /// Base pairs per element of the refinement vectors
    pub secondary_resolution: u32,
    pub secondary_blur: u32,
    /// Reference margin added on both sides of a seed before refinement
    pub secondary_margin: Position,
    /// Minimum raw correlation of a refined peak
    pub peak_height_threshold: f64,
    /// Maximum distance between paired labels, in bp
    pub max_pair_distance: Position,
    pub perfect_match_score: f64,
    pub distance_penalty_multiplier: f64,
    pub unmatched_penalty: f64,
    pub min_score: f64,
    pub break_segment_threshold: f64,
    /// Largest reference gap bridged when joining two passes
    pub max_difference: Position,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            primary_resolution: 1400,
            primary_blur: 2,
            peaks_count: 5,
            min_peak_distance: 20_000,
            secondary_resolution: 200,
            secondary_blur: 2,
            secondary_margin: 16_000,
            peak_height_threshold: 15.0,
            max_pair_distance: 1_000,
            perfect_match_score: 800.0,
            distance_penalty_multiplier: 1.0,
            unmatched_penalty: -100.0,
            min_score: 1_000.0,
            break_segment_threshold: 1_200.0,
            max_difference: 100_000,
        }
    }
}

impl AlignmentParams {
    pub fn validate(&self) -> AlignResult<()> {
        if self.primary_resolution < 1 || self.secondary_resolution < 1 {
            return Err(AlignError::invalid_parameter("resolution must be at least 1"));
        }
        if self.peaks_count == 0 {
            return Err(AlignError::invalid_parameter("peaks count must be at least 1"));
        }
        if self.min_peak_distance < 0 || self.secondary_margin < 0 {
            return Err(AlignError::invalid_parameter(
                "peak distance and refinement margin must not be negative",
            ));
        }
        if self.max_pair_distance < 0 || self.max_difference < 0 {
            return Err(AlignError::invalid_parameter(
                "pair distance and join distance must not be negative",
            ));
        }
        if self.perfect_match_score <= 0.0 {
            return Err(AlignError::invalid_parameter(format!(
                "perfect match score must be positive, got {}",
                self.perfect_match_score
            )));
        }
        if self.unmatched_penalty > 0.0 {
            return Err(AlignError::invalid_parameter(format!(
                "unmatched penalty must not be positive, got {}",
                self.unmatched_penalty
            )));
        }
        if self.break_segment_threshold < 0.0 {
            return Err(AlignError::invalid_parameter(
                "break segment threshold must not be negative",
            ));
        }
        Ok(())
    }

    /// Seed peak separation expressed in seeding-vector elements.
    pub fn primary_min_distance(&self) -> usize {
        let resolution = Position::from(self.primary_resolution.max(1));
        ((self.min_peak_distance / resolution) as usize).max(1)
    }
}
