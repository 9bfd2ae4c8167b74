//! Cross-correlation seeding and refinement.
//!
//! Both stages vectorise the maps, correlate the query vector against the
//! reference vector with an FFT and pick offsets with the peak finder.

pub mod initial;
pub mod peaks;
pub mod refine;
pub mod vector;

pub use initial::InitialAligner;
pub use peaks::{Peak, PeakFinder, PeakPolicy};
pub use refine::Refiner;
pub use vector::Vectoriser;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::cmp::Ordering;

use crate::types::{OpticalMap, Position, Strand};

/// Correlation of one query against one reference (or reference window).
#[derive(Debug, Clone)]
pub struct Correlation<'a> {
    pub values: Vec<f64>,
    pub reference: &'a OpticalMap,
    pub query: &'a OpticalMap,
    pub strand: Strand,
    pub resolution: u32,
    pub blur_radius: u32,
    pub window_start: Position,
    pub window_end: Position,
    pub peaks: Vec<Peak>,
    /// Median correlation value
    pub noise_level: f64,
}

impl<'a> Correlation<'a> {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn max_value(&self) -> f64 {
        max_value(&self.values)
    }

    pub fn best_peak(&self) -> Option<&Peak> {
        self.peaks.first()
    }
}

/// Valid-mode FFT cross-correlation. Owns its planner so that repeated
/// correlations of equal size reuse the cached plans; keep one per worker.
pub struct CorrelationEngine {
    planner: FftPlanner<f64>,
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationEngine {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// `c[i] = Σⱼ reference[i + j] · query[j]` for `i` in `0..=M-K`.
    ///
    /// Empty when the query is empty or longer than the reference. Values are
    /// rounded to the nearest integer since inputs are 0/1 vectors.
    pub fn correlate(&mut self, reference: &[u8], query: &[u8]) -> Vec<f64> {
        let m = reference.len();
        let k = query.len();
        if k == 0 || k > m {
            return Vec::new();
        }

        let size = (m + k - 1).next_power_of_two();
        let zero = Complex::new(0.0, 0.0);

        let mut reference_buffer: Vec<Complex<f64>> = reference
            .iter()
            .map(|&v| Complex::new(f64::from(v), 0.0))
            .chain(std::iter::repeat(zero))
            .take(size)
            .collect();
        let mut query_buffer: Vec<Complex<f64>> = query
            .iter()
            .rev()
            .map(|&v| Complex::new(f64::from(v), 0.0))
            .chain(std::iter::repeat(zero))
            .take(size)
            .collect();

        let forward = self.planner.plan_fft_forward(size);
        forward.process(&mut reference_buffer);
        forward.process(&mut query_buffer);

        for (r, q) in reference_buffer.iter_mut().zip(&query_buffer) {
            *r *= *q;
        }

        let inverse = self.planner.plan_fft_inverse(size);
        inverse.process(&mut reference_buffer);

        let scale = size as f64;
        reference_buffer[k - 1..m]
            .iter()
            .map(|c| (c.re / scale).round())
            .collect()
    }
}

/// `E[i] = Σⱼ reference[i + j]` over windows of `window` elements, i.e. the
/// correlation of the reference with an all-ones query.
pub fn density(reference: &[u8], window: usize) -> Vec<f64> {
    if window == 0 || window > reference.len() {
        return Vec::new();
    }

    let mut prefix = Vec::with_capacity(reference.len() + 1);
    prefix.push(0u64);
    for &v in reference {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + u64::from(v));
    }

    (0..=reference.len() - window)
        .map(|i| (prefix[i + window] - prefix[i]) as f64)
        .collect()
}

/// Divide each correlation value by the mean of the local reference density
/// and the query label mass.
pub fn normalise(reference: &[u8], query: &[u8], correlation: &[f64]) -> Vec<f64> {
    let query_mass: f64 = query.iter().map(|&v| f64::from(v)).sum();
    let local = density(reference, query.len());

    correlation
        .iter()
        .zip(local)
        .map(|(&c, e)| {
            let denominator = (e + query_mass) / 2.0;
            if denominator > 0.0 {
                c / denominator
            } else {
                0.0
            }
        })
        .collect()
}

pub fn max_value(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
