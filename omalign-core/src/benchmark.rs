//! Scoring alignments against known placements.
//!
//! The truth file is either an XMAP (a `#h` header naming `XmapEntryID`) or
//! an SDATA table of simulated fragments whose header starts with
//! `Fragment ID`. A query counts as correctly aligned when one of its
//! records lands on the true reference and strand, starting within the
//! tolerance of the true start.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Cursor};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AlignError, AlignResult};
use crate::io::{field, open_reader, parse_rounded, ColumnIndex, XmapReader};
use crate::record::AlignmentRecord;
use crate::types::{MoleculeId, Position, Strand};

pub const DEFAULT_TOLERANCE: Position = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruthFormat {
    Xmap,
    Sdata,
}

/// Where a query truly belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruthPlacement {
    pub query_id: MoleculeId,
    pub reference_id: MoleculeId,
    pub strand: Strand,
    pub reference_start: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub format: TruthFormat,
    pub tolerance: Position,
    /// Queries with a known placement
    pub total: usize,
    /// Queries with at least one record
    pub aligned: usize,
    pub correct: usize,
    pub precision: f64,
    pub recall: f64,
}

#[derive(Debug, Clone)]
pub struct TruthSet {
    format: TruthFormat,
    placements: HashMap<MoleculeId, Vec<TruthPlacement>>,
}

impl TruthSet {
    pub fn read_path<P: AsRef<Path>>(path: P) -> AlignResult<Self> {
        let mut lines = Vec::new();
        for line in open_reader(&path)?.lines() {
            lines.push(line?);
        }

        let format = detect_format(&lines).ok_or_else(|| AlignError::UnsupportedFormat {
            path: path.as_ref().to_path_buf(),
        })?;
        let placements = match format {
            TruthFormat::Xmap => {
                let rows = XmapReader::read(Cursor::new(lines.join("\n")))?;
                rows.into_iter()
                    .map(|row| TruthPlacement {
                        query_id: row.query_id,
                        reference_id: row.reference_id,
                        strand: row.strand,
                        reference_start: row.reference_start.min(row.reference_end),
                    })
                    .collect()
            }
            TruthFormat::Sdata => parse_sdata(&lines)?,
        };

        log::info!(
            "Read {} truth placements ({:?}) from {}",
            placements.len(),
            format,
            path.as_ref().display()
        );
        Ok(Self::new(format, placements))
    }

    pub fn new(format: TruthFormat, placements: Vec<TruthPlacement>) -> Self {
        let mut by_query: HashMap<MoleculeId, Vec<TruthPlacement>> = HashMap::new();
        for placement in placements {
            by_query.entry(placement.query_id).or_default().push(placement);
        }
        Self {
            format,
            placements: by_query,
        }
    }

    pub fn format(&self) -> TruthFormat {
        self.format
    }

    pub fn query_count(&self) -> usize {
        self.placements.len()
    }

    pub fn is_correct(&self, record: &AlignmentRecord, tolerance: Position) -> bool {
        self.placements.get(&record.query_id).is_some_and(|truths| {
            truths.iter().any(|truth| {
                truth.reference_id == record.reference_id
                    && truth.strand == record.strand
                    && (truth.reference_start - record.reference_start).abs() <= tolerance
            })
        })
    }

    /// Score records against the truth. Queries without a known placement
    /// are ignored.
    pub fn evaluate(&self, records: &[AlignmentRecord], tolerance: Position) -> BenchmarkSummary {
        let mut aligned: HashSet<MoleculeId> = HashSet::new();
        let mut correct: HashSet<MoleculeId> = HashSet::new();

        for record in records.iter().filter(|r| self.placements.contains_key(&r.query_id)) {
            aligned.insert(record.query_id);
            if self.is_correct(record, tolerance) {
                correct.insert(record.query_id);
            }
        }

        let total = self.query_count();
        let ratio = |n: usize, d: usize| if d == 0 { 0.0 } else { n as f64 / d as f64 };
        BenchmarkSummary {
            format: self.format,
            tolerance,
            total,
            aligned: aligned.len(),
            correct: correct.len(),
            precision: ratio(correct.len(), aligned.len()),
            recall: ratio(correct.len(), total),
        }
    }
}

fn detect_format(lines: &[String]) -> Option<TruthFormat> {
    if lines
        .iter()
        .any(|line| line.starts_with("#h") && line.contains("XmapEntryID"))
    {
        return Some(TruthFormat::Xmap);
    }

    let header = lines.iter().find(|line| !line.trim().is_empty())?;
    let first = header.trim_start_matches('#').split([',', '\t']).next()?;
    (first.trim() == "Fragment ID").then_some(TruthFormat::Sdata)
}

fn parse_sdata(lines: &[String]) -> AlignResult<Vec<TruthPlacement>> {
    let mut rows = lines.iter().enumerate().filter(|(_, line)| !line.trim().is_empty());
    let Some((header_index, header)) = rows.next() else {
        return Ok(Vec::new());
    };
    let delimiter = if header.contains('\t') { '\t' } else { ',' };
    let columns = ColumnIndex::parse(&header.trim_start_matches('#').replace(delimiter, "\t"));

    let header_line = header_index + 1;
    let id_col = columns.require("Fragment ID", header_line)?;
    let reference_col = columns.require("Reference", header_line)?;
    let strand_col = columns.require("Strand", header_line)?;
    let start_col = columns.require("Start", header_line)?;
    let stop_col = columns.require("Stop", header_line)?;

    rows.map(|(index, line)| -> AlignResult<TruthPlacement> {
        let line_no = index + 1;
        let fields: Vec<&str> = line.split(delimiter).collect();
        let id = |col: usize| -> AlignResult<MoleculeId> {
            let value = parse_rounded(field(&fields, col, line_no)?, line_no)?;
            MoleculeId::try_from(value).map_err(|_| AlignError::malformed(line_no, format!("invalid id {}", value)))
        };

        let strand_field = field(&fields, strand_col, line_no)?;
        let strand = parse_strand(strand_field)
            .ok_or_else(|| AlignError::malformed(line_no, format!("invalid strand '{}'", strand_field)))?;
        let start = parse_rounded(field(&fields, start_col, line_no)?, line_no)?;
        let stop = parse_rounded(field(&fields, stop_col, line_no)?, line_no)?;

        Ok(TruthPlacement {
            query_id: id(id_col)?,
            reference_id: id(reference_col)?,
            strand,
            reference_start: start.min(stop),
        })
    })
    .collect()
}

fn parse_strand(value: &str) -> Option<Strand> {
    Strand::from_symbol(value).or_else(|| match value.to_ascii_lowercase().as_str() {
        "forward" => Some(Strand::Forward),
        "reverse" => Some(Strand::Reverse),
        _ => None,
    })
}
