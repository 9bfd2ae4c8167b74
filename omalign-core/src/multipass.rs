//! Two-pass alignment of a query set against a reference set.
//!
//! The first pass keeps the best record per query. Queries whose alignment
//! leaves a large part of the molecule unexplained are cut into residual
//! fragments, which go through the pipeline a second time. The records of
//! both passes are then combined according to the output mode.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::conflict::ConflictResolver;
use crate::correlate::CorrelationEngine;
use crate::error::{AlignError, AlignResult};
use crate::observer::{AlignmentObserver, Pass, PipelineEvent, ProgressObserver};
use crate::params::AlignmentParams;
use crate::pipeline::Aligner;
use crate::record::{AlignmentRecord, FragmentFrame, RESIDUAL_OVERLAP};
use crate::types::{MoleculeId, OpticalMap, Position};

/// First-pass records covering less than this share of the query get a
/// second pass on their residual fragments.
pub const MIN_QUERY_COVERAGE: f64 = 0.8;

/// Smallest residual fragment worth aligning, overlap labels included.
pub const MIN_RESIDUAL_LABELS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    #[default]
    Best,
    Separate,
    Joined,
    All,
}

impl FromStr for OutputMode {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Ok(OutputMode::Best),
            "separate" => Ok(OutputMode::Separate),
            "joined" => Ok(OutputMode::Joined),
            "all" => Ok(OutputMode::All),
            other => Err(AlignError::invalid_parameter(format!(
                "unknown output mode '{}', expected best, separate, joined or all",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputMode::Best => "best",
            OutputMode::Separate => "separate",
            OutputMode::Joined => "joined",
            OutputMode::All => "all",
        };
        f.write_str(name)
    }
}

/// One output table of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Best,
    FirstPass,
    SecondPass,
    Joined,
    FirstPassFiltered,
    SecondPassFiltered,
}

impl OutputKind {
    /// Suffix appended to the output file stem when a mode writes several
    /// files.
    pub fn file_suffix(self) -> &'static str {
        match self {
            OutputKind::Best => "_best",
            OutputKind::FirstPass => "_first_pass",
            OutputKind::SecondPass => "_second_pass",
            OutputKind::Joined => "_joined",
            OutputKind::FirstPassFiltered => "_first_pass_filtered",
            OutputKind::SecondPassFiltered => "_second_pass_filtered",
        }
    }
}

/// The tables produced for one output mode, in writing order.
#[derive(Debug, Clone, Default)]
pub struct OutputSet {
    pub outputs: Vec<(OutputKind, Vec<AlignmentRecord>)>,
}

impl OutputSet {
    pub fn get(&self, kind: OutputKind) -> Option<&[AlignmentRecord]> {
        self.outputs
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, records)| records.as_slice())
    }

    pub fn is_multi_file(&self) -> bool {
        self.outputs.len() > 1
    }

    pub fn record_count(&self) -> usize {
        self.outputs.iter().map(|(_, records)| records.len()).sum()
    }
}

/// A piece of a query cut out for the second pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualFragment {
    pub map: OpticalMap,
    pub frame: FragmentFrame,
}

/// Head and tail fragments of `query` left unexplained by `record`.
///
/// Each fragment reaches `RESIDUAL_OVERLAP` labels into the aligned region
/// and is kept only with at least `MIN_RESIDUAL_LABELS` labels.
pub fn residual_fragments(query: &OpticalMap, record: &AlignmentRecord) -> AlignResult<Vec<ResidualFragment>> {
    let mut fragments = Vec::new();
    if record.query_coverage() >= MIN_QUERY_COVERAGE {
        return Ok(fragments);
    }
    let Some((min_site, max_site)) = record.query_site_range() else {
        return Ok(fragments);
    };

    let positions = query.positions();
    let n = positions.len();

    let head_end = (min_site - 1 + RESIDUAL_OVERLAP).min(n);
    if head_end >= MIN_RESIDUAL_LABELS {
        let length = positions[head_end - 1] + 1;
        fragments.push(ResidualFragment {
            map: query.fragment(0..head_end, 0, length)?,
            frame: FragmentFrame {
                site_offset: 0,
                offset: 0,
                fragment_length: length,
                parent_length: query.length(),
            },
        });
    }

    let tail_start = max_site.saturating_sub(RESIDUAL_OVERLAP);
    if n.saturating_sub(tail_start) >= MIN_RESIDUAL_LABELS {
        let offset = positions[tail_start];
        let length = query.length() - offset;
        fragments.push(ResidualFragment {
            map: query.fragment(tail_start..n, offset, length)?,
            frame: FragmentFrame {
                site_offset: tail_start,
                offset,
                fragment_length: length,
                parent_length: query.length(),
            },
        });
    }

    Ok(fragments)
}

/// Records of both passes, before they are arranged into outputs.
#[derive(Debug, Clone, Default)]
pub struct PassResults {
    pub first_pass: Vec<AlignmentRecord>,
    pub second_pass: Vec<AlignmentRecord>,
}

pub struct MultiPassCoordinator {
    aligner: Aligner,
    mode: OutputMode,
    max_difference: Position,
    cancelled: Arc<AtomicBool>,
}

impl MultiPassCoordinator {
    pub fn new(params: &AlignmentParams, mode: OutputMode) -> AlignResult<Self> {
        Ok(Self {
            aligner: Aligner::new(params)?,
            mode,
            max_difference: params.max_difference,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn add_observer(&mut self, observer: Arc<dyn AlignmentObserver>) {
        self.aligner.add_observer(observer);
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Flag polled before each task; once set, remaining tasks are skipped.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Align every query and arrange the records for the output mode.
    pub fn run(
        &self,
        references: &[OpticalMap],
        queries: &[OpticalMap],
        progress: Option<&dyn ProgressObserver>,
    ) -> OutputSet {
        let passes = self.align_passes(references, queries, progress);
        assemble_outputs(self.mode, passes, self.max_difference, self.aligner.resolver())
    }

    /// Both passes, each sorted by query id then confidence.
    pub fn align_passes(
        &self,
        references: &[OpticalMap],
        queries: &[OpticalMap],
        progress: Option<&dyn ProgressObserver>,
    ) -> PassResults {
        log::info!(
            "First pass: {} queries against {} references",
            queries.len(),
            references.len()
        );
        if let Some(progress) = progress {
            progress.on_start(queries.len());
        }

        let mut first_pass: Vec<AlignmentRecord> = queries
            .par_iter()
            .map_init(CorrelationEngine::new, |engine, query| {
                let record = self.task(|| self.best_record(engine, references, query, Pass::First));
                if let Some(progress) = progress {
                    progress.on_task_complete();
                }
                record
            })
            .flatten()
            .collect();
        sort_records(&mut first_pass);

        let by_id: HashMap<MoleculeId, &OpticalMap> = queries.iter().map(|q| (q.molecule_id(), q)).collect();
        let mut fragments = Vec::new();
        for record in &first_pass {
            let Some(query) = by_id.get(&record.query_id) else {
                continue;
            };
            match residual_fragments(query, record) {
                Ok(found) => fragments.extend(found),
                Err(e) => log::warn!("Skipping residuals of query {}: {}", record.query_id, e),
            }
        }

        log::info!(
            "Second pass: {} residual fragments from {} first-pass records",
            fragments.len(),
            first_pass.len()
        );
        if let Some(progress) = progress {
            progress.on_start(fragments.len());
        }

        let mut second_pass: Vec<AlignmentRecord> = fragments
            .par_iter()
            .map_init(CorrelationEngine::new, |engine, fragment| {
                let record = self.task(|| {
                    self.best_record(engine, references, &fragment.map, Pass::Second)
                        .map(|record| record.into_parent_frame(&fragment.frame))
                });
                if let Some(progress) = progress {
                    progress.on_task_complete();
                }
                record
            })
            .flatten()
            .collect();
        sort_records(&mut second_pass);

        if let Some(progress) = progress {
            progress.on_finish();
        }
        if self.cancelled.load(Ordering::Relaxed) {
            log::warn!("Alignment cancelled; results are partial");
        }

        PassResults {
            first_pass,
            second_pass,
        }
    }

    fn task<F>(&self, f: F) -> Option<AlignmentRecord>
    where
        F: FnOnce() -> Option<AlignmentRecord>,
    {
        if self.cancelled.load(Ordering::Relaxed) {
            return None;
        }
        f()
    }

    /// Highest-confidence record of `query` over all references.
    fn best_record(
        &self,
        engine: &mut CorrelationEngine,
        references: &[OpticalMap],
        query: &OpticalMap,
        pass: Pass,
    ) -> Option<AlignmentRecord> {
        let best = references
            .iter()
            .flat_map(|reference| self.aligner.align(engine, reference, query))
            .min_by(by_confidence)?;

        log::debug!(
            "query {} ({:?} pass): reference {} {:?} confidence {:.1}",
            best.query_id,
            pass,
            best.reference_id,
            best.strand,
            best.confidence
        );
        if self.aligner.has_observers() {
            self.aligner.emit(PipelineEvent::Record {
                pass,
                reference_id: best.reference_id,
                query_id: best.query_id,
                strand: best.strand,
                confidence: best.confidence,
                segments: best.segments.len(),
                hit_enum: best.hit_enum(),
            });
        }
        Some(best)
    }
}

/// Higher confidence first; ties fall back to the lower reference id.
fn by_confidence(a: &AlignmentRecord, b: &AlignmentRecord) -> CmpOrdering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(CmpOrdering::Equal)
        .then(a.reference_id.cmp(&b.reference_id))
        .then(a.strand.is_reverse().cmp(&b.strand.is_reverse()))
}

/// Sort by query id, then confidence descending.
pub fn sort_records(records: &mut [AlignmentRecord]) {
    records.sort_by(|a, b| a.query_id.cmp(&b.query_id).then_with(|| by_confidence(a, b)));
}

/// Arrange the records of both passes into the tables of `mode`.
pub fn assemble_outputs(
    mode: OutputMode,
    passes: PassResults,
    max_difference: Position,
    resolver: &ConflictResolver,
) -> OutputSet {
    let PassResults {
        first_pass,
        second_pass,
    } = passes;

    let outputs = match mode {
        OutputMode::Best => vec![(OutputKind::Best, best_per_query(first_pass, second_pass))],
        OutputMode::Separate => vec![
            (OutputKind::FirstPass, first_pass),
            (OutputKind::SecondPass, second_pass),
        ],
        OutputMode::Joined | OutputMode::All => {
            let joins = join_passes(first_pass, second_pass, max_difference, resolver);
            let mut joined = joins.joined;
            joined.extend(joins.first_pass_filtered.iter().cloned());
            joined.extend(joins.second_pass_filtered.iter().cloned());
            sort_records(&mut joined);

            if mode == OutputMode::Joined {
                vec![(OutputKind::Joined, joined)]
            } else {
                vec![
                    (OutputKind::Joined, joined),
                    (OutputKind::FirstPassFiltered, joins.first_pass_filtered),
                    (OutputKind::SecondPassFiltered, joins.second_pass_filtered),
                ]
            }
        }
    };

    OutputSet { outputs }
}

fn best_per_query(first_pass: Vec<AlignmentRecord>, second_pass: Vec<AlignmentRecord>) -> Vec<AlignmentRecord> {
    let mut best: HashMap<MoleculeId, AlignmentRecord> = HashMap::new();
    for record in first_pass.into_iter().chain(second_pass) {
        match best.get(&record.query_id) {
            Some(current) if current.confidence >= record.confidence => {}
            _ => {
                best.insert(record.query_id, record);
            }
        }
    }
    let mut records: Vec<AlignmentRecord> = best.into_values().collect();
    sort_records(&mut records);
    records
}

struct Joins {
    joined: Vec<AlignmentRecord>,
    first_pass_filtered: Vec<AlignmentRecord>,
    second_pass_filtered: Vec<AlignmentRecord>,
}

fn join_passes(
    first_pass: Vec<AlignmentRecord>,
    second_pass: Vec<AlignmentRecord>,
    max_difference: Position,
    resolver: &ConflictResolver,
) -> Joins {
    let mut consumed: HashSet<usize> = HashSet::new();
    let mut joined = Vec::new();
    let mut first_pass_filtered = Vec::new();

    for first in first_pass {
        let mut merged = first.clone();
        let mut used = Vec::new();

        let mut candidates: Vec<(usize, &AlignmentRecord)> = second_pass
            .iter()
            .enumerate()
            .filter(|(i, second)| !consumed.contains(i) && second.query_id == first.query_id)
            .collect();
        candidates.sort_by_key(|(_, second)| second.reference_start);

        for (i, second) in candidates {
            if merged.can_join(second, max_difference) {
                merged = merged.join(second.clone(), resolver);
                used.push(i);
            }
        }

        if used.is_empty() {
            first_pass_filtered.push(first);
        } else {
            log::debug!("query {}: joined {} residual records", first.query_id, used.len());
            consumed.extend(used);
            joined.push(merged);
        }
    }

    let second_pass_filtered = second_pass
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| (!consumed.contains(&i)).then_some(record))
        .collect();

    Joins {
        joined,
        first_pass_filtered,
        second_pass_filtered,
    }
}
