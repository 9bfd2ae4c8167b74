//! Binary vectorisation of label positions.

use crate::error::{AlignError, AlignResult};
use crate::types::{OpticalMap, Position};

/// Turns label positions into a fixed-resolution 0/1 vector and widens
/// every hit by `blur_radius` elements on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vectoriser {
    resolution: u32,
    blur_radius: u32,
}

impl Vectoriser {
    pub fn new(resolution: u32, blur_radius: u32) -> AlignResult<Self> {
        if resolution < 1 {
            return Err(AlignError::invalid_parameter(format!(
                "resolution must be at least 1, got {}",
                resolution
            )));
        }
        Ok(Self {
            resolution,
            blur_radius,
        })
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn blur_radius(&self) -> u32 {
        self.blur_radius
    }

    /// Vectorise `positions` over the window `[start, end)`.
    pub fn vectorise(&self, positions: &[Position], start: Position, end: Position) -> Vec<u8> {
        let hits = bucketise(positions, self.resolution, start, end);
        blur(&hits, self.blur_radius as usize)
    }

    /// Vectorise a whole map over `[0, map.vector_end())`.
    pub fn vectorise_map(&self, map: &OpticalMap) -> Vec<u8> {
        self.vectorise(map.positions(), 0, map.vector_end())
    }
}

/// Number of `resolution`-wide elements needed to cover `[start, end)`.
pub fn vector_length(resolution: u32, start: Position, end: Position) -> usize {
    if end <= start {
        return 0;
    }
    let resolution = Position::from(resolution.max(1));
    ((end - start + resolution - 1) / resolution) as usize
}

/// Mark every element of `[start, end)` that holds at least one position.
pub fn bucketise(positions: &[Position], resolution: u32, start: Position, end: Position) -> Vec<u8> {
    let mut vector = vec![0u8; vector_length(resolution, start, end)];
    let resolution = Position::from(resolution.max(1));

    for &position in positions {
        if position < start {
            continue;
        }
        if position >= end {
            break;
        }
        vector[((position - start) / resolution) as usize] = 1;
    }

    vector
}

/// Symmetric dilation: element `i` is set when any of `i-radius..=i+radius` is.
pub fn blur(vector: &[u8], radius: usize) -> Vec<u8> {
    if radius == 0 || vector.is_empty() {
        return vector.to_vec();
    }

    let len = vector.len();
    let mut blurred = vec![0u8; len];
    // First element not yet written, so overlapping windows are filled once
    let mut filled = 0usize;

    for (i, _) in vector.iter().enumerate().filter(|(_, &v)| v != 0) {
        let from = i.saturating_sub(radius).max(filled);
        let to = (i + radius + 1).min(len);
        for slot in &mut blurred[from..to] {
            *slot = 1;
        }
        filled = filled.max(to);
    }

    blurred
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_every_bucket_hit() {
        let positions: Vec<Position> = (0..10).map(|i| i * 5).collect();
        let vector = bucketise(&positions, 5, 0, 50);
        assert_eq!(vector, vec![1; 10]);
    }

    #[test]
    fn test_unit_resolution() {
        let vector = bucketise(&[2, 5, 8], 1, 0, 9);
        assert_eq!(vector, vec![0, 0, 1, 0, 0, 1, 0, 0, 1]);
    }

    #[test]
    fn test_window_skips_and_terminates() {
        let vector = bucketise(&[1, 12, 17, 25, 40], 5, 10, 30);
        assert_eq!(vector, vec![1, 1, 0, 1]);
    }

    #[test]
    fn test_window_length_rounds_up() {
        assert_eq!(vector_length(1400, 0, 1401), 2);
        assert_eq!(vector_length(1400, 0, 1400), 1);
        assert_eq!(vector_length(200, -300, 100), 2);
        assert_eq!(vector_length(200, 10, 10), 0);
    }

    #[test]
    fn test_blur_widens_labels() {
        let vector = vec![0, 0, 0, 1, 0, 0, 0, 0, 0, 1];
        assert_eq!(blur(&vector, 1), vec![0, 0, 1, 1, 1, 0, 0, 0, 1, 1]);
        assert_eq!(blur(&vector, 2), vec![0, 1, 1, 1, 1, 1, 0, 1, 1, 1]);
    }

    #[test]
    fn test_zero_resolution_rejected() {
        assert!(matches!(
            Vectoriser::new(0, 2),
            Err(AlignError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_map_vector_includes_label_on_end() {
        let map = OpticalMap::new(1, 10, vec![0, 10]).unwrap();
        let vectoriser = Vectoriser::new(5, 0).unwrap();
        assert_eq!(vectoriser.vectorise_map(&map), vec![1, 0, 1]);
    }

    proptest! {
        #[test]
        fn blur_zero_is_identity(vector in proptest::collection::vec(0u8..2, 0..200)) {
            prop_assert_eq!(blur(&vector, 0), vector);
        }

        #[test]
        fn blur_is_monotonic_in_radius(
            vector in proptest::collection::vec(0u8..2, 1..200),
            small in 0usize..5,
            extra in 0usize..5,
        ) {
            let narrow = blur(&vector, small);
            let wide = blur(&vector, small + extra);
            for (n, w) in narrow.iter().zip(&wide) {
                prop_assert!(n <= w);
            }
            for (v, n) in vector.iter().zip(&narrow) {
                prop_assert!(v <= n);
            }
        }

        #[test]
        fn bucket_count_matches_distinct_bins(
            positions in proptest::collection::btree_set(0i64..5_000, 0..100),
            resolution in 1u32..300,
        ) {
            let positions: Vec<Position> = positions.into_iter().collect();
            let vector = bucketise(&positions, resolution, 0, 5_000);
            let mut bins: Vec<i64> = positions.iter().map(|p| p / i64::from(resolution)).collect();
            bins.dedup();
            prop_assert_eq!(vector.iter().filter(|&&v| v == 1).count(), bins.len());
        }
    }
}
