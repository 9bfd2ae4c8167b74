//! Tabular file I/O
//!
//! Readers for CMAP label tables and XMAP alignment tables, and the XMAP
//! writer. All readers accept gzip-compressed input.

pub mod cmap;
pub mod xmap;

pub use cmap::CmapReader;
pub use xmap::{XmapReader, XmapRow, XmapWriter};

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{AlignError, AlignResult};

/// Open a text file for line reading, decompressing `.gz` transparently.
pub fn open_reader<P: AsRef<Path>>(path: P) -> AlignResult<Box<dyn BufRead>> {
    let file = File::open(&path)?;
    let path_str = path.as_ref().to_string_lossy();

    let reader: Box<dyn Read> = if path_str.ends_with(".gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Column positions named by a `#h` header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    names: Vec<String>,
}

impl ColumnIndex {
    /// Parse a header line, with or without its `#h` prefix.
    pub fn parse(line: &str) -> Self {
        let body = line.trim_start_matches("#h").trim_start_matches('#');
        let names = body
            .split('\t')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        Self { names }
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn require(&self, name: &str, line: usize) -> AlignResult<usize> {
        self.index(name)
            .ok_or_else(|| AlignError::malformed(line, format!("missing column {}", name)))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Field `index` of a tab-split row.
pub(crate) fn field<'a>(fields: &[&'a str], index: usize, line: usize) -> AlignResult<&'a str> {
    fields
        .get(index)
        .map(|f| f.trim())
        .ok_or_else(|| AlignError::malformed(line, format!("expected at least {} fields, got {}", index + 1, fields.len())))
}

/// Integer field that may be written as a float.
pub(crate) fn parse_rounded(value: &str, line: usize) -> AlignResult<i64> {
    if let Ok(v) = value.parse::<i64>() {
        return Ok(v);
    }
    match value.parse::<f64>() {
        // Range check keeps `as` from saturating
        Ok(v) if v.is_finite() && v.abs() < i64::MAX as f64 => Ok(v.round() as i64),
        _ => Err(AlignError::malformed(line, format!("invalid number '{}'", value))),
    }
}

pub(crate) fn parse_float(value: &str, line: usize) -> AlignResult<f64> {
    value
        .parse::<f64>()
        .map_err(|_| AlignError::malformed(line, format!("invalid number '{}'", value)))
}
