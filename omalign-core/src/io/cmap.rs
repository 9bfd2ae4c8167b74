//! CMAP label table reader
//!
//! CMAP is a tab-separated table of labelled sites. Comment lines start with
//! `#`, the `#h` line names the columns. Rows with `LabelChannel` 0 mark the
//! end of a molecule, rows with channel 1 are labels; other channels are
//! ignored.

use std::collections::{BTreeMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use super::{field, open_reader, parse_rounded, ColumnIndex};
use crate::error::{AlignError, AlignResult};
use crate::types::{MoleculeId, OpticalMap, Position};

const LABEL_CHANNEL: i64 = 1;
const END_CHANNEL: i64 = 0;

#[derive(Debug, Default)]
struct MapBuilder {
    first_line: usize,
    length: Option<Position>,
    contig_length: Position,
    positions: Vec<Position>,
}

pub struct CmapReader;

impl CmapReader {
    /// Read every molecule of a CMAP file, keeping only ids in `filter`
    /// when one is given. Molecules come out sorted by id.
    pub fn read_path<P: AsRef<Path>>(path: P, filter: Option<&HashSet<MoleculeId>>) -> AlignResult<Vec<OpticalMap>> {
        let reader = open_reader(&path)?;
        let maps = Self::read(reader, filter)?;
        log::info!(
            "Read {} molecules from {}",
            maps.len(),
            path.as_ref().display()
        );
        Ok(maps)
    }

    pub fn read<R: BufRead>(reader: R, filter: Option<&HashSet<MoleculeId>>) -> AlignResult<Vec<OpticalMap>> {
        let mut columns: Option<(usize, usize, usize, usize)> = None;
        let mut builders: BTreeMap<MoleculeId, MapBuilder> = BTreeMap::new();
        let mut last_line = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = line_num + 1;
            last_line = line_no;

            if line.starts_with("#h") {
                let header = ColumnIndex::parse(&line);
                columns = Some((
                    header.require("CMapId", line_no)?,
                    header.require("Position", line_no)?,
                    header.require("LabelChannel", line_no)?,
                    header.require("ContigLength", line_no)?,
                ));
                continue;
            }
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((id_col, position_col, channel_col, length_col)) = columns else {
                return Err(AlignError::malformed(line_no, "data row before the #h header line"));
            };

            let fields: Vec<&str> = line.split('\t').collect();
            let id = parse_rounded(field(&fields, id_col, line_no)?, line_no)?;
            let id = MoleculeId::try_from(id)
                .map_err(|_| AlignError::malformed(line_no, format!("invalid CMapId {}", id)))?;
            if filter.is_some_and(|ids| !ids.contains(&id)) {
                continue;
            }

            let position = parse_rounded(field(&fields, position_col, line_no)?, line_no)?;
            let channel = parse_rounded(field(&fields, channel_col, line_no)?, line_no)?;
            let contig_length = parse_rounded(field(&fields, length_col, line_no)?, line_no)?;

            let builder = builders.entry(id).or_insert_with(|| MapBuilder {
                first_line: line_no,
                ..Default::default()
            });
            builder.contig_length = contig_length;
            match channel {
                END_CHANNEL => builder.length = Some(position),
                LABEL_CHANNEL => builder.positions.push(position),
                _ => {}
            }
        }

        if columns.is_none() {
            return Err(AlignError::malformed(last_line, "missing #h header line"));
        }

        builders
            .into_iter()
            .map(|(id, mut builder)| {
                builder.positions.sort_unstable();
                builder.positions.dedup();
                let length = builder.length.unwrap_or(builder.contig_length);
                OpticalMap::new(id, length, builder.positions)
                    .map_err(|e| AlignError::malformed(builder.first_line, e.to_string()))
            })
            .collect()
    }
}
