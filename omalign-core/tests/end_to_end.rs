use std::fmt::Write as _;
use std::io::Write;
use std::ops::Range;

use omalign_core::benchmark::{TruthFormat, TruthPlacement, TruthSet, DEFAULT_TOLERANCE};
use omalign_core::io::{CmapReader, XmapReader, XmapWriter};
use omalign_core::{
    AlignmentParams, AlignmentRecord, MultiPassCoordinator, OpticalMap, OutputKind, OutputMode, Position, Strand,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

const QUERY_FLANK: Position = 1_000;
/// Label spacing unit of `grid_reference`
const GRID: Position = 4_000;
/// How much closer the tail block sits to the head in a split query
const TAIL_SHIFT: Position = 50_000;
const HEAD_LABELS: usize = 20;
const SKIPPED_LABELS: usize = 5;
const TAIL_LABELS: usize = 45;

fn random_reference(seed: u64, labels: usize) -> OpticalMap {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut position = 5_000;
    let mut positions = Vec::with_capacity(labels);
    for _ in 0..labels {
        position += rng.gen_range(4_000..16_000);
        positions.push(position);
    }
    OpticalMap::new(1, position + 5_000, positions).unwrap()
}

/// Query made of reference labels `first..last`, with a short flank on
/// both ends, optionally read from the other end.
fn query_from(reference: &OpticalMap, id: u32, first: usize, last: usize, strand: Strand) -> OpticalMap {
    let labels = &reference.positions()[first..last];
    let offset = labels[0] - QUERY_FLANK;
    let length = labels[labels.len() - 1] - offset + QUERY_FLANK;
    let mut positions: Vec<Position> = labels.iter().map(|p| p - offset).collect();
    if strand == Strand::Reverse {
        positions = positions.iter().rev().map(|p| length - 1 - p).collect();
    }
    OpticalMap::new(id, length, positions).unwrap()
}

fn write_cmap(maps: &[OpticalMap]) -> NamedTempFile {
    let mut text = String::from(
        "# CMAP File Version:\t0.2\n\
         # Label Channels:\t1\n\
         #h CMapId\tContigLength\tNumSites\tSiteID\tLabelChannel\tPosition\tStdDev\tCoverage\tOccurrence\n\
         #f int\tfloat\tint\tint\tint\tfloat\tfloat\tfloat\tfloat\n",
    );
    for map in maps {
        let length = map.length() as f64;
        for (i, &position) in map.positions().iter().enumerate() {
            writeln!(
                text,
                "{}\t{:.1}\t{}\t{}\t1\t{:.1}\t1.0\t1\t1",
                map.molecule_id(),
                length,
                map.label_count(),
                i + 1,
                position as f64
            )
            .unwrap();
        }
        writeln!(
            text,
            "{}\t{:.1}\t{}\t{}\t0\t{:.1}\t0.0\t1\t0",
            map.molecule_id(),
            length,
            map.label_count(),
            map.label_count() + 1,
            length
        )
        .unwrap();
    }

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn finds_forward_and_reverse_queries() {
    let reference = random_reference(7, 80);
    let forward = query_from(&reference, 10, 20, 40, Strand::Forward);
    let reverse = query_from(&reference, 11, 45, 65, Strand::Reverse);

    let coordinator = MultiPassCoordinator::new(&AlignmentParams::default(), OutputMode::Best).unwrap();
    let outputs = coordinator.run(&[reference.clone()], &[forward, reverse], None);
    let records = outputs.get(OutputKind::Best).expect("best table");
    assert_eq!(records.len(), 2);

    let forward_record = &records[0];
    assert_eq!(forward_record.query_id, 10);
    assert_eq!(forward_record.strand, Strand::Forward);
    assert_eq!(forward_record.reference_start, reference.positions()[20]);
    assert_eq!(forward_record.hit_enum(), "20M");

    let reverse_record = &records[1];
    assert_eq!(reverse_record.query_id, 11);
    assert_eq!(reverse_record.strand, Strand::Reverse);
    assert_eq!(reverse_record.reference_start, reference.positions()[45]);
    assert!(reverse_record.query_start > reverse_record.query_end);
}

#[test]
fn cmap_in_xmap_out() {
    let reference = random_reference(11, 60);
    let queries = vec![
        query_from(&reference, 21, 5, 25, Strand::Forward),
        query_from(&reference, 22, 30, 50, Strand::Reverse),
    ];
    let reference_file = write_cmap(&[reference.clone()]);
    let query_file = write_cmap(&queries);

    let references = CmapReader::read_path(reference_file.path(), None).unwrap();
    let queries = CmapReader::read_path(query_file.path(), None).unwrap();
    assert_eq!(references[0].positions(), reference.positions());

    let coordinator = MultiPassCoordinator::new(&AlignmentParams::default(), OutputMode::Best).unwrap();
    let outputs = coordinator.run(&references, &queries, None);
    let records = outputs.get(OutputKind::Best).unwrap();

    let output = NamedTempFile::new().unwrap();
    let mut writer = XmapWriter::create(output.path(), "reference.cmap", "query.cmap").unwrap();
    writer.write_all(records).unwrap();
    writer.finish().unwrap();

    let rows = XmapReader::read_path(output.path()).unwrap();
    assert_eq!(rows.len(), records.len());
    assert_eq!(rows[0].entry_id, 1);
    assert_eq!(rows[0].query_id, 21);
    assert_eq!(rows[1].strand, Strand::Reverse);

    let truth = TruthSet::new(
        TruthFormat::Sdata,
        vec![
            TruthPlacement {
                query_id: 21,
                reference_id: 1,
                strand: Strand::Forward,
                reference_start: reference.positions()[5],
            },
            TruthPlacement {
                query_id: 22,
                reference_id: 1,
                strand: Strand::Reverse,
                reference_start: reference.positions()[30],
            },
        ],
    );
    let summary = truth.evaluate(records, DEFAULT_TOLERANCE);
    assert_eq!((summary.total, summary.aligned, summary.correct), (2, 2, 2));
    assert_eq!(summary.recall, 1.0);
}

#[test]
fn unrelated_query_records_meet_min_score() {
    let reference = random_reference(3, 60);
    let other = random_reference(99, 20);
    let query = OpticalMap::new(30, other.length(), other.positions().to_vec()).unwrap();

    let coordinator = MultiPassCoordinator::new(&AlignmentParams::default(), OutputMode::Best).unwrap();
    let outputs = coordinator.run(&[reference], &[query], None);
    let records = outputs.get(OutputKind::Best).unwrap();
    assert!(records.iter().all(|r| r.confidence >= 1_000.0));
}

/// Reference with labels on a `GRID` lattice and random gaps of one to four
/// units. Gaps with an index in `fixed_gaps` are three units.
fn grid_reference(seed: u64, labels: usize, fixed_gaps: Range<usize>) -> OpticalMap {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut position = 5 * GRID;
    let mut positions = Vec::with_capacity(labels);
    for i in 0..labels {
        let units: Position = if fixed_gaps.contains(&i) { 3 } else { rng.gen_range(1..=4) };
        position += units * GRID;
        positions.push(position);
    }
    OpticalMap::new(1, position + 5 * GRID, positions).unwrap()
}

/// Query of `HEAD_LABELS` reference labels from `first`, followed by
/// `TAIL_LABELS` labels after a run of `SKIPPED_LABELS`, moved `TAIL_SHIFT`
/// towards the head. Off-lattice by half a unit, neither block pairs by
/// chance when the other one is placed.
fn split_query(reference: &OpticalMap, id: u32, first: usize, strand: Strand) -> OpticalMap {
    let labels = reference.positions();
    let offset = labels[first] - QUERY_FLANK;
    let tail_first = first + HEAD_LABELS + SKIPPED_LABELS;

    let mut positions: Vec<Position> = labels[first..first + HEAD_LABELS].iter().map(|p| p - offset).collect();
    positions.extend(
        labels[tail_first..tail_first + TAIL_LABELS]
            .iter()
            .map(|p| p - offset - TAIL_SHIFT),
    );
    let length = positions[positions.len() - 1] + QUERY_FLANK;
    if strand == Strand::Reverse {
        positions = positions.iter().rev().map(|p| length - 1 - p).collect();
    }
    OpticalMap::new(id, length, positions).unwrap()
}

fn only_record(records: Option<&[AlignmentRecord]>) -> &AlignmentRecord {
    let records = records.expect("output table");
    assert_eq!(records.len(), 1);
    &records[0]
}

fn residual_pass_joins(strand: Strand) {
    const FIRST: usize = 20;
    let head_last = FIRST + HEAD_LABELS - 1;
    let tail_first = FIRST + HEAD_LABELS + SKIPPED_LABELS;
    let tail_last = tail_first + TAIL_LABELS - 1;

    // Three-unit gaps across the skipped labels leave the query a 22 kbp gap
    let reference = grid_reference(23, 120, head_last + 1..tail_first + 1);
    let query = split_query(&reference, 40, FIRST, strand);
    let positions = reference.positions();

    // A single seed per orientation lets the first pass take the tail only
    let params = AlignmentParams {
        peaks_count: 1,
        ..Default::default()
    };

    let separate = MultiPassCoordinator::new(&params, OutputMode::Separate)
        .unwrap()
        .run(std::slice::from_ref(&reference), std::slice::from_ref(&query), None);
    assert!(separate.is_multi_file());

    let first_pass = only_record(separate.get(OutputKind::FirstPass));
    assert_eq!(first_pass.strand, strand);
    assert!(!first_pass.aligned_from_residual);
    assert_eq!(first_pass.hit_enum(), "45M");
    assert_eq!(
        (first_pass.reference_start, first_pass.reference_end),
        (positions[tail_first], positions[tail_last])
    );
    assert!(first_pass.query_coverage() < 0.8);

    let second_pass = only_record(separate.get(OutputKind::SecondPass));
    assert_eq!(second_pass.query_id, 40);
    assert_eq!(second_pass.strand, strand);
    assert!(second_pass.aligned_from_residual);
    assert_eq!(second_pass.hit_enum(), "20M");
    assert_eq!(second_pass.query_length, query.length());
    assert_eq!(
        (second_pass.reference_start, second_pass.reference_end),
        (positions[FIRST], positions[head_last])
    );

    // Second-pass query sites are back in the parent's numbering
    let head_sites = match strand {
        Strand::Forward => (1, HEAD_LABELS),
        Strand::Reverse => (TAIL_LABELS + 1, TAIL_LABELS + HEAD_LABELS),
    };
    assert_eq!(second_pass.query_site_range(), Some(head_sites));

    let joined_outputs = MultiPassCoordinator::new(&params, OutputMode::Joined)
        .unwrap()
        .run(std::slice::from_ref(&reference), std::slice::from_ref(&query), None);
    let joined = only_record(joined_outputs.get(OutputKind::Joined));
    assert_eq!(joined.segments.len(), 2);
    assert!(joined.aligned_from_residual);
    assert_eq!(joined.hit_enum(), "20M5D45M");
    assert_eq!(
        (joined.reference_start, joined.reference_end),
        (positions[FIRST], positions[tail_last])
    );
    assert!((joined.confidence - (first_pass.confidence + second_pass.confidence)).abs() < 1e-6);
    assert_eq!(joined.query_site_range(), Some((1, HEAD_LABELS + TAIL_LABELS)));

    match strand {
        Strand::Forward => {
            assert_eq!(joined.query_start, QUERY_FLANK);
            assert!(joined.query_start < joined.query_end);
        }
        Strand::Reverse => {
            assert_eq!(joined.query_end, QUERY_FLANK - 1);
            assert!(joined.query_start > joined.query_end);
            assert!(second_pass.query_start > second_pass.query_end);
        }
    }
}

#[test]
fn residual_pass_joins_forward() {
    residual_pass_joins(Strand::Forward);
}

#[test]
fn residual_pass_joins_reverse() {
    residual_pass_joins(Strand::Reverse);
}
