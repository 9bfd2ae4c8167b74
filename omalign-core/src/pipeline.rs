//! Alignment of one query against one reference.
//!
//! Seeds from the coarse correlation are refined, every refined offset is
//! turned into scored segments, and the segments of one orientation are
//! chained and resolved into a single record.

use std::sync::Arc;

use crate::chain::SegmentChainer;
use crate::conflict::ConflictResolver;
use crate::correlate::{CorrelationEngine, InitialAligner, Peak, Refiner};
use crate::error::AlignResult;
use crate::observer::{AlignmentObserver, PipelineEvent};
use crate::pairs::PairAligner;
use crate::params::AlignmentParams;
use crate::record::AlignmentRecord;
use crate::scoring::PositionScorer;
use crate::segment::{AlignmentSegment, SegmentExtractor};
use crate::types::{OpticalMap, Strand};

pub struct Aligner {
    initial: InitialAligner,
    refiner: Refiner,
    pair_aligner: PairAligner,
    scorer: PositionScorer,
    extractor: SegmentExtractor,
    chainer: SegmentChainer,
    resolver: ConflictResolver,
    observers: Vec<Arc<dyn AlignmentObserver>>,
}

impl Aligner {
    pub fn new(params: &AlignmentParams) -> AlignResult<Self> {
        params.validate()?;
        Ok(Self {
            initial: InitialAligner::new(params)?,
            refiner: Refiner::new(params)?,
            pair_aligner: PairAligner::new(params.max_pair_distance),
            scorer: PositionScorer::from_params(params)?,
            extractor: SegmentExtractor::new(params.min_score, params.break_segment_threshold),
            chainer: SegmentChainer::new(),
            resolver: ConflictResolver::new(),
            observers: Vec::new(),
        })
    }

    pub fn add_observer(&mut self, observer: Arc<dyn AlignmentObserver>) {
        self.observers.push(observer);
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn emit(&self, event: PipelineEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    /// Records for every orientation that produced one, at most two.
    pub fn align(
        &self,
        engine: &mut CorrelationEngine,
        reference: &OpticalMap,
        query: &OpticalMap,
    ) -> Vec<AlignmentRecord> {
        let seeds = self.initial.align(engine, reference, query);
        let mut records = Vec::new();

        for seed in seeds {
            if self.has_observers() {
                self.emit(PipelineEvent::InitialPeaks {
                    reference_id: reference.molecule_id(),
                    query_id: query.molecule_id(),
                    strand: seed.strand,
                    peaks: seed.peaks.clone(),
                    max_value: seed.max_value(),
                    noise_level: seed.noise_level,
                });
            }

            let mut refined: Vec<Peak> = Vec::with_capacity(seed.peaks.len());
            for peak in &seed.peaks {
                let correlation = self.refiner.refine(engine, reference, query, peak, seed.strand);
                let best = correlation.best_peak().copied();

                if self.has_observers() {
                    self.emit(PipelineEvent::RefinedPeak {
                        reference_id: reference.molecule_id(),
                        query_id: query.molecule_id(),
                        strand: seed.strand,
                        seed: *peak,
                        refined: best,
                    });
                }

                if let Some(best) = best {
                    if !refined.iter().any(|p| p.position == best.position) {
                        refined.push(best);
                    }
                }
            }

            log::debug!(
                "query {} on reference {} ({:?}): {} seeds, {} refined",
                query.molecule_id(),
                reference.molecule_id(),
                seed.strand,
                seed.peaks.len(),
                refined.len()
            );

            if let Some(record) = self.align_at_peaks(reference, query, seed.strand, &refined) {
                records.push(record);
            }
        }

        records
    }

    /// Pair, score, extract, chain and resolve at the given offsets.
    pub fn align_at_peaks(
        &self,
        reference: &OpticalMap,
        query: &OpticalMap,
        strand: Strand,
        peaks: &[Peak],
    ) -> Option<AlignmentRecord> {
        let segments: Vec<AlignmentSegment> = peaks
            .iter()
            .flat_map(|peak| {
                let positions = self.pair_aligner.align(reference, query, peak.position, strand);
                let scored = self.scorer.score_all(positions);
                self.extractor.extract(&scored, peak)
            })
            .collect();

        if segments.is_empty() {
            return None;
        }

        let chain = self.chainer.chain(segments, strand);
        let resolved = self.resolver.resolve(chain, strand);
        AlignmentRecord::from_segments(reference, query, strand, resolved)
    }
}
