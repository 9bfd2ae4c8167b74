use crate::error::{AlignError, AlignResult};
use crate::pairs::AlignmentPosition;
use crate::params::AlignmentParams;

/// An aligned pair or unpaired label together with its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPosition {
    pub position: AlignmentPosition,
    pub score: f64,
}

impl ScoredPosition {
    pub fn is_aligned(&self) -> bool {
        matches!(self.position, AlignmentPosition::Aligned(_))
    }
}

/// Scores pairs by distance and unpaired labels by a flat penalty.
#[derive(Debug, Clone, Copy)]
pub struct PositionScorer {
    perfect_match_score: f64,
    distance_penalty_multiplier: f64,
    unmatched_penalty: f64,
}

impl PositionScorer {
    pub fn new(perfect_match_score: f64, distance_penalty_multiplier: f64, unmatched_penalty: f64) -> AlignResult<Self> {
        if unmatched_penalty > 0.0 {
            return Err(AlignError::invalid_parameter(format!(
                "unmatched penalty must not be positive, got {}",
                unmatched_penalty
            )));
        }
        if perfect_match_score <= 0.0 {
            return Err(AlignError::invalid_parameter(format!(
                "perfect match score must be positive, got {}",
                perfect_match_score
            )));
        }

        Ok(Self {
            perfect_match_score,
            distance_penalty_multiplier,
            unmatched_penalty,
        })
    }

    pub fn from_params(params: &AlignmentParams) -> AlignResult<Self> {
        Self::new(
            params.perfect_match_score,
            params.distance_penalty_multiplier,
            params.unmatched_penalty,
        )
    }

    pub fn score(&self, position: &AlignmentPosition) -> f64 {
        match position {
            AlignmentPosition::Aligned(pair) => {
                self.perfect_match_score - self.distance_penalty_multiplier * pair.distance() as f64
            }
            AlignmentPosition::NotAligned(_) => self.unmatched_penalty,
        }
    }

    pub fn score_all(&self, positions: Vec<AlignmentPosition>) -> Vec<ScoredPosition> {
        positions
            .into_iter()
            .map(|position| ScoredPosition {
                score: self.score(&position),
                position,
            })
            .collect()
    }
}
