//! XMAP alignment tables.

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use super::{field, open_reader, parse_float, parse_rounded, ColumnIndex};
use crate::cigar;
use crate::error::{AlignError, AlignResult};
use crate::record::AlignmentRecord;
use crate::types::{MoleculeId, Position, Strand};

const COLUMNS: [&str; 15] = [
    "XmapEntryID",
    "QryContigID",
    "RefContigID",
    "QryStartPos",
    "QryEndPos",
    "RefStartPos",
    "RefEndPos",
    "Orientation",
    "Confidence",
    "HitEnum",
    "QryLen",
    "RefLen",
    "AlignedRest",
    "LabelChannel",
    "Alignment",
];

const TYPES: [&str; 15] = [
    "int", "int", "int", "float", "float", "float", "float", "string", "float", "string", "float", "float", "int",
    "int", "string",
];

/// Writes alignment records as XMAP rows, numbering them from 1.
pub struct XmapWriter<W: Write> {
    writer: W,
    next_id: usize,
}

impl XmapWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, reference_source: &str, query_source: &str) -> AlignResult<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), reference_source, query_source)
    }
}

impl<W: Write> XmapWriter<W> {
    /// Start a table; the header names the files both map sets came from.
    pub fn new(mut writer: W, reference_source: &str, query_source: &str) -> AlignResult<Self> {
        writeln!(writer, "# XMAP File Version:\t0.2")?;
        writeln!(writer, "# Label Channels:\t1")?;
        writeln!(writer, "# Reference Maps From:\t{}", reference_source)?;
        writeln!(writer, "# Query Maps From:\t{}", query_source)?;
        writeln!(writer, "#h {}", COLUMNS.join("\t"))?;
        writeln!(writer, "#f {}", TYPES.join("\t"))?;
        Ok(Self { writer, next_id: 1 })
    }

    pub fn write_record(&mut self, record: &AlignmentRecord) -> AlignResult<()> {
        let alignment: String = record
            .aligned_pairs()
            .iter()
            .map(|p| format!("({},{})", p.reference.site_id, p.query.site_id))
            .collect();

        writeln!(
            self.writer,
            "{}\t{}\t{}\t{:.1}\t{:.1}\t{:.1}\t{:.1}\t{}\t{:.2}\t{}\t{:.1}\t{:.1}\t{}\t1\t{}",
            self.next_id,
            record.query_id,
            record.reference_id,
            record.query_start as f64,
            record.query_end as f64,
            record.reference_start as f64,
            record.reference_end as f64,
            char::from(record.strand),
            record.confidence,
            record.hit_enum(),
            record.query_length as f64,
            record.reference_length as f64,
            u8::from(record.aligned_from_residual),
            alignment,
        )?;
        self.next_id += 1;
        Ok(())
    }

    pub fn write_all<'a, I>(&mut self, records: I) -> AlignResult<()>
    where
        I: IntoIterator<Item = &'a AlignmentRecord>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> AlignResult<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// One parsed XMAP row.
#[derive(Debug, Clone, PartialEq)]
pub struct XmapRow {
    pub entry_id: usize,
    pub query_id: MoleculeId,
    pub reference_id: MoleculeId,
    pub query_start: Position,
    pub query_end: Position,
    pub reference_start: Position,
    pub reference_end: Position,
    pub strand: Strand,
    pub confidence: f64,
    pub hit_enum: Option<String>,
    /// `(reference site, query site)` pairs
    pub alignment: Vec<(usize, usize)>,
}

pub struct XmapReader;

impl XmapReader {
    pub fn read_path<P: AsRef<Path>>(path: P) -> AlignResult<Vec<XmapRow>> {
        Self::read(open_reader(path)?)
    }

    pub fn read<R: BufRead>(reader: R) -> AlignResult<Vec<XmapRow>> {
        let mut header: Option<ColumnIndex> = None;
        let mut rows = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = line_num + 1;

            if line.starts_with("#h") {
                header = Some(ColumnIndex::parse(&line));
                continue;
            }
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let columns = header
                .as_ref()
                .ok_or_else(|| AlignError::malformed(line_no, "data row before the #h header line"))?;
            rows.push(Self::parse_row(&line, columns, line_no)?);
        }

        Ok(rows)
    }

    fn parse_row(line: &str, columns: &ColumnIndex, line_no: usize) -> AlignResult<XmapRow> {
        let fields: Vec<&str> = line.split('\t').collect();
        let get = |name: &str| -> AlignResult<&str> { field(&fields, columns.require(name, line_no)?, line_no) };
        let get_id = |name: &str| -> AlignResult<MoleculeId> {
            let value = parse_rounded(get(name)?, line_no)?;
            MoleculeId::try_from(value).map_err(|_| AlignError::malformed(line_no, format!("invalid {} {}", name, value)))
        };

        let orientation = get("Orientation")?;
        let strand = Strand::from_symbol(orientation)
            .ok_or_else(|| AlignError::malformed(line_no, format!("invalid orientation '{}'", orientation)))?;

        let optional = |name: &str| columns.index(name).and_then(|i| fields.get(i)).map(|f| f.trim());
        let entry_id = match optional("XmapEntryID") {
            Some(value) => {
                let id = parse_rounded(value, line_no)?;
                usize::try_from(id)
                    .map_err(|_| AlignError::malformed(line_no, format!("invalid XmapEntryID {}", id)))?
            }
            None => 0,
        };
        let hit_enum = optional("HitEnum").filter(|h| !h.is_empty());
        if let Some(hit_enum) = hit_enum {
            cigar::decode(hit_enum, line_no)?;
        }
        let alignment = match optional("Alignment") {
            Some(value) => parse_alignment(value, line_no)?,
            None => Vec::new(),
        };

        Ok(XmapRow {
            entry_id,
            query_id: get_id("QryContigID")?,
            reference_id: get_id("RefContigID")?,
            query_start: parse_rounded(get("QryStartPos")?, line_no)?,
            query_end: parse_rounded(get("QryEndPos")?, line_no)?,
            reference_start: parse_rounded(get("RefStartPos")?, line_no)?,
            reference_end: parse_rounded(get("RefEndPos")?, line_no)?,
            strand,
            confidence: parse_float(get("Confidence")?, line_no)?,
            hit_enum: hit_enum.map(str::to_string),
            alignment,
        })
    }
}

/// Parse `(r,q)(r,q)...`.
fn parse_alignment(value: &str, line_no: usize) -> AlignResult<Vec<(usize, usize)>> {
    value
        .split(')')
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| -> AlignResult<(usize, usize)> {
            let inner = chunk.trim_start_matches('(');
            let (r, q) = inner
                .split_once(',')
                .ok_or_else(|| AlignError::malformed(line_no, format!("invalid alignment pair '{}'", chunk)))?;
            let parse = |s: &str| {
                s.trim()
                    .parse::<usize>()
                    .map_err(|_| AlignError::malformed(line_no, format!("invalid site id '{}'", s)))
            };
            Ok((parse(r)?, parse(q)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::Peak;
    use crate::pairs::{AlignedPair, AlignmentPosition};
    use crate::scoring::ScoredPosition;
    use crate::segment::AlignmentSegment;
    use crate::types::{OpticalMap, PositionWithSiteId};
    use std::io::Cursor;

    fn reverse_record() -> AlignmentRecord {
        let reference = OpticalMap::new(1, 10, vec![0, 4, 8]).unwrap();
        let query = OpticalMap::new(2, 9, vec![0, 4, 8]).unwrap();
        let positions = [(1, 0, 3, 0), (2, 4, 2, 4), (3, 8, 1, 8)]
            .iter()
            .map(|&(r, rp, q, qp)| ScoredPosition {
                position: AlignmentPosition::Aligned(AlignedPair::new(
                    PositionWithSiteId::new(r, rp),
                    PositionWithSiteId::new(q, qp),
                    0,
                )),
                score: 800.0,
            })
            .collect();
        let segment = AlignmentSegment::new(positions, Peak::at(0));
        AlignmentRecord::from_segments(&reference, &query, Strand::Reverse, vec![segment]).unwrap()
    }

    #[test]
    fn test_writes_header_and_row() {
        let mut writer = XmapWriter::new(Vec::new(), "ref.cmap", "query.cmap").unwrap();
        writer.write_record(&reverse_record()).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# XMAP File Version:\t0.2");
        assert_eq!(lines[2], "# Reference Maps From:\tref.cmap");
        assert_eq!(lines[3], "# Query Maps From:\tquery.cmap");
        assert!(lines[4].starts_with("#h XmapEntryID\tQryContigID"));
        assert!(lines[5].starts_with("#f int"));
        assert_eq!(
            lines[6],
            "1\t2\t1\t8.0\t0.0\t0.0\t8.0\t-\t2400.00\t3M\t9.0\t10.0\t0\t1\t(1,3)(2,2)(3,1)"
        );
    }

    #[test]
    fn test_reads_back_rows() {
        let mut writer = XmapWriter::new(Vec::new(), "ref.cmap", "query.cmap").unwrap();
        writer.write_record(&reverse_record()).unwrap();
        let bytes = writer.finish().unwrap();

        let rows = XmapReader::read(Cursor::new(bytes)).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.entry_id, 1);
        assert_eq!((row.query_id, row.reference_id), (2, 1));
        assert_eq!(row.strand, Strand::Reverse);
        assert_eq!(row.hit_enum.as_deref(), Some("3M"));
        assert_eq!(row.alignment, vec![(1, 3), (2, 2), (3, 1)]);
    }

    #[test]
    fn test_rejects_bad_orientation() {
        let data = format!("#h {}\n1\t2\t1\t0\t8\t0\t8\tx\t10\t3M\t9\t10\t0\t1\t(1,1)\n", COLUMNS.join("\t"));
        let err = XmapReader::read(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, AlignError::MalformedInput { line: 2, .. }));
    }

    #[test]
    fn test_rejects_negative_entry_id() {
        let data = format!("#h {}\n-1\t2\t1\t0\t8\t0\t8\t+\t10\t3M\t9\t10\t0\t1\t(1,1)\n", COLUMNS.join("\t"));
        let err = XmapReader::read(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, AlignError::MalformedInput { line: 2, .. }));
    }

    #[test]
    fn test_rejects_bad_hit_enum() {
        let data = format!("#h {}\n1\t2\t1\t0\t8\t0\t8\t+\t10\t3Q\t9\t10\t0\t1\t(1,1)\n", COLUMNS.join("\t"));
        let err = XmapReader::read(Cursor::new(data)).unwrap_err();
        assert!(err.is_input_error());
        assert!(matches!(err, AlignError::MalformedInput { line: 2, .. }));
    }
}
