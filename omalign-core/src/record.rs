//! Final alignment records and cross-pass joining.

use std::cmp::Ordering;

use crate::cigar;
use crate::conflict::ConflictResolver;
use crate::pairs::{AlignedPair, AlignmentPosition, NotAlignedPosition};
use crate::segment::AlignmentSegment;
use crate::types::{MoleculeId, OpticalMap, Position, PositionWithSiteId, Strand};

/// Labels a residual fragment shares with the aligned part of its parent.
pub const RESIDUAL_OVERLAP: usize = 2;

/// One query placed on one reference.
///
/// Query coordinates are in the query's own frame, so on the reverse strand
/// `query_start > query_end`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub query_id: MoleculeId,
    pub reference_id: MoleculeId,
    pub query_length: Position,
    pub reference_length: Position,
    pub strand: Strand,
    pub query_start: Position,
    pub query_end: Position,
    pub reference_start: Position,
    pub reference_end: Position,
    pub confidence: f64,
    pub segments: Vec<AlignmentSegment>,
    pub aligned_from_residual: bool,
}

impl AlignmentRecord {
    /// Record for the given segments, or `None` when none of them holds a pair.
    pub fn from_segments(
        reference: &OpticalMap,
        query: &OpticalMap,
        strand: Strand,
        segments: Vec<AlignmentSegment>,
    ) -> Option<Self> {
        Self::from_parts(
            query.molecule_id(),
            reference.molecule_id(),
            query.length(),
            reference.length(),
            strand,
            segments,
        )
    }

    fn from_parts(
        query_id: MoleculeId,
        reference_id: MoleculeId,
        query_length: Position,
        reference_length: Position,
        strand: Strand,
        segments: Vec<AlignmentSegment>,
    ) -> Option<Self> {
        let segments: Vec<AlignmentSegment> = segments.into_iter().filter(|s| !s.is_empty()).collect();

        let pairs = sorted_pairs(&segments);
        let first = pairs.first()?;
        let last = pairs.last()?;

        let query_coordinate = |site: &PositionWithSiteId| match strand {
            Strand::Forward => site.position,
            Strand::Reverse => query_length - 1 - site.position,
        };

        Some(Self {
            query_id,
            reference_id,
            query_length,
            reference_length,
            strand,
            query_start: query_coordinate(&first.query),
            query_end: query_coordinate(&last.query),
            reference_start: first.reference.position,
            reference_end: last.reference.position,
            confidence: segments.iter().map(|s| s.segment_score).sum(),
            segments,
            aligned_from_residual: false,
        })
    }

    pub fn is_reverse(&self) -> bool {
        self.strand.is_reverse()
    }

    /// Every aligned pair of every segment, in reference-site order.
    pub fn aligned_pairs(&self) -> Vec<AlignedPair> {
        sorted_pairs(&self.segments)
    }

    pub fn hit_enum(&self) -> String {
        cigar::hit_enum(&self.aligned_pairs())
    }

    pub fn query_span(&self) -> Position {
        (self.query_end - self.query_start).abs()
    }

    pub fn reference_span(&self) -> Position {
        self.reference_end - self.reference_start
    }

    /// Share of the query length covered by the alignment.
    pub fn query_coverage(&self) -> f64 {
        if self.query_length <= 0 {
            return 0.0;
        }
        self.query_span() as f64 / self.query_length as f64
    }

    /// Smallest and largest aligned query site ids.
    pub fn query_site_range(&self) -> Option<(usize, usize)> {
        let sites = self.segments.iter().flat_map(|s| s.aligned_pairs()).map(|p| p.query.site_id);
        let (min, max) = sites.fold((usize::MAX, 0), |(min, max), site| (min.min(site), max.max(site)));
        (min <= max).then_some((min, max))
    }

    /// True when `other` continues this record along the query on the same
    /// reference and strand, in a consistent order, with a reference gap of
    /// at most `max_difference`.
    pub fn can_join(&self, other: &AlignmentRecord, max_difference: Position) -> bool {
        if self.query_id != other.query_id || self.reference_id != other.reference_id || self.strand != other.strand {
            return false;
        }
        let (Some(a), Some(b)) = (self.query_site_range(), other.query_site_range()) else {
            return false;
        };

        let ((first_sites, first), (second_sites, second)) = if a.0 <= b.0 {
            ((a, self), (b, other))
        } else {
            ((b, other), (a, self))
        };
        if second_sites.1 <= first_sites.1 {
            return false;
        }
        if second_sites.0 > first_sites.1 + RESIDUAL_OVERLAP {
            return false;
        }

        let (upstream, downstream) = match self.strand {
            Strand::Forward => (first, second),
            Strand::Reverse => (second, first),
        };
        if downstream.reference_start < upstream.reference_start {
            return false;
        }
        downstream.reference_start - upstream.reference_end <= max_difference
    }

    /// Merge two records of the same query into one.
    ///
    /// Segments of both are resolved against each other; the result is
    /// always a record flagged as aligned from a residual.
    pub fn join(self, other: AlignmentRecord, resolver: &ConflictResolver) -> AlignmentRecord {
        let strand = self.strand;
        let mut segments: Vec<AlignmentSegment> = self.segments.iter().chain(&other.segments).cloned().collect();
        segments.sort_by_key(|s| s.first_pair().map_or(0, |p| p.reference.site_id));

        let resolved = resolver.resolve(segments, strand);
        let joined = Self::from_parts(
            self.query_id,
            self.reference_id,
            self.query_length,
            self.reference_length,
            strand,
            resolved,
        );

        let mut record = match joined {
            Some(record) => record,
            None => match self.confidence.partial_cmp(&other.confidence) {
                Some(Ordering::Less) => other,
                _ => self,
            },
        };
        record.aligned_from_residual = true;
        record
    }

    /// Move a record computed on a residual fragment back into the frame of
    /// the molecule the fragment was cut from.
    pub fn into_parent_frame(self, frame: &FragmentFrame) -> AlignmentRecord {
        let strand = self.strand;
        let segments: Vec<AlignmentSegment> = self
            .segments
            .iter()
            .map(|segment| {
                segment.map_positions(|position| match position {
                    AlignmentPosition::Aligned(pair) => AlignmentPosition::Aligned(AlignedPair {
                        query: frame.to_parent(pair.query, strand),
                        ..pair
                    }),
                    AlignmentPosition::NotAligned(NotAlignedPosition::Query {
                        site,
                        absolute_position,
                    }) => AlignmentPosition::NotAligned(NotAlignedPosition::Query {
                        site: frame.to_parent(site, strand),
                        absolute_position,
                    }),
                    other => other,
                })
            })
            .collect();

        let parent = Self::from_parts(
            self.query_id,
            self.reference_id,
            frame.parent_length,
            self.reference_length,
            strand,
            segments,
        );
        let mut record = parent.unwrap_or(AlignmentRecord {
            query_length: frame.parent_length,
            ..self
        });
        record.aligned_from_residual = true;
        record
    }
}

/// Placement of a residual fragment inside its parent molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentFrame {
    /// Parent site id of the fragment's site 0 (fragment ids are 1-based)
    pub site_offset: usize,
    /// Parent coordinate of the fragment origin
    pub offset: Position,
    pub fragment_length: Position,
    pub parent_length: Position,
}

impl FragmentFrame {
    /// Convert a fragment site, oriented as on `strand`, to the parent frame.
    pub fn to_parent(&self, site: PositionWithSiteId, strand: Strand) -> PositionWithSiteId {
        let position = match strand {
            Strand::Forward => site.position + self.offset,
            Strand::Reverse => site.position + self.parent_length - self.fragment_length - self.offset,
        };
        PositionWithSiteId::new(site.site_id + self.site_offset, position)
    }
}

fn sorted_pairs(segments: &[AlignmentSegment]) -> Vec<AlignedPair> {
    let mut pairs: Vec<AlignedPair> = segments.iter().flat_map(|s| s.aligned_pairs().copied()).collect();
    pairs.sort_by_key(|p| (p.reference.site_id, p.query.site_id));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::Peak;
    use crate::scoring::ScoredPosition;

    fn segment(sites: &[(usize, Position, usize, Position)], reference_start: Position) -> AlignmentSegment {
        let positions = sites
            .iter()
            .map(|&(r, rp, q, qp)| ScoredPosition {
                position: AlignmentPosition::Aligned(AlignedPair::new(
                    PositionWithSiteId::new(r, rp),
                    PositionWithSiteId::new(q, qp),
                    reference_start,
                )),
                score: 800.0,
            })
            .collect();
        AlignmentSegment::new(positions, Peak::at(reference_start))
    }

    #[test]
    fn test_forward_coordinates() {
        let reference = OpticalMap::new(1, 10_000, vec![1_000, 2_000, 3_000]).unwrap();
        let query = OpticalMap::new(2, 2_500, vec![100, 1_100, 2_100]).unwrap();
        let seg = segment(&[(1, 1_000, 1, 100), (2, 2_000, 2, 1_100), (3, 3_000, 3, 2_100)], 900);

        let record = AlignmentRecord::from_segments(&reference, &query, Strand::Forward, vec![seg]).unwrap();
        assert_eq!((record.query_start, record.query_end), (100, 2_100));
        assert_eq!((record.reference_start, record.reference_end), (1_000, 3_000));
        assert_eq!(record.confidence, 2_400.0);
        assert_eq!(record.hit_enum(), "3M");
        assert_eq!(record.query_site_range(), Some((1, 3)));
    }

    #[test]
    fn test_reverse_coordinates_are_swapped() {
        let reference = OpticalMap::new(1, 10, vec![0, 4, 8]).unwrap();
        let query = OpticalMap::new(2, 9, vec![0, 4, 8]).unwrap();
        // Mirrored query positions: site 3 -> 0, site 2 -> 4, site 1 -> 8
        let seg = segment(&[(1, 0, 3, 0), (2, 4, 2, 4), (3, 8, 1, 8)], 0);

        let record = AlignmentRecord::from_segments(&reference, &query, Strand::Reverse, vec![seg]).unwrap();
        assert!(record.is_reverse());
        assert_eq!(record.query_start, 8);
        assert_eq!(record.query_end, 0);
        assert!(record.query_start > record.query_end);
    }

    #[test]
    fn test_no_pairs_no_record() {
        let reference = OpticalMap::new(1, 10, vec![0, 4, 8]).unwrap();
        let query = OpticalMap::new(2, 9, vec![0, 4, 8]).unwrap();
        assert!(AlignmentRecord::from_segments(&reference, &query, Strand::Forward, Vec::new()).is_none());
    }

    #[test]
    fn test_join_adjacent_records() {
        let reference = OpticalMap::new(1, 500_000, vec![10_000, 20_000, 30_000, 90_000, 100_000]).unwrap();
        let query = OpticalMap::new(2, 60_000, vec![0, 10_000, 20_000, 30_000, 40_000]).unwrap();

        let head = segment(&[(1, 10_000, 1, 0), (2, 20_000, 2, 10_000), (3, 30_000, 3, 20_000)], 10_000);
        let tail = segment(&[(4, 90_000, 4, 30_000), (5, 100_000, 5, 40_000)], 60_000);

        let first = AlignmentRecord::from_segments(&reference, &query, Strand::Forward, vec![head]).unwrap();
        let second = AlignmentRecord::from_segments(&reference, &query, Strand::Forward, vec![tail]).unwrap();

        assert!(first.can_join(&second, 100_000));
        assert!(second.can_join(&first, 100_000));
        assert!(!first.can_join(&second, 50_000));

        let joined = first.join(second, &ConflictResolver::new());
        assert_eq!(joined.segments.len(), 2);
        assert_eq!(joined.confidence, 4_000.0);
        assert!(joined.aligned_from_residual);
        assert_eq!((joined.reference_start, joined.reference_end), (10_000, 100_000));
    }

    #[test]
    fn test_join_rejects_other_reference_and_wrong_order() {
        let reference = OpticalMap::new(1, 500_000, vec![10_000, 20_000, 30_000, 90_000, 100_000]).unwrap();
        let other_reference = OpticalMap::new(9, 500_000, vec![10_000, 20_000]).unwrap();
        let query = OpticalMap::new(2, 60_000, vec![0, 10_000, 20_000, 30_000, 40_000]).unwrap();

        let head = segment(&[(4, 90_000, 1, 0), (5, 100_000, 2, 10_000)], 90_000);
        let tail = segment(&[(1, 10_000, 4, 30_000), (2, 20_000, 5, 40_000)], -20_000);

        let first = AlignmentRecord::from_segments(&reference, &query, Strand::Forward, vec![head]).unwrap();
        let second = AlignmentRecord::from_segments(&reference, &query, Strand::Forward, vec![tail.clone()]).unwrap();
        assert!(!first.can_join(&second, 100_000));

        let elsewhere = AlignmentRecord::from_segments(&other_reference, &query, Strand::Forward, vec![tail]).unwrap();
        assert!(!first.can_join(&elsewhere, 100_000));
    }

    #[test]
    fn test_fragment_frame() {
        let frame = FragmentFrame {
            site_offset: 4,
            offset: 3_000,
            fragment_length: 7_000,
            parent_length: 10_000,
        };
        let forward = frame.to_parent(PositionWithSiteId::new(1, 0), Strand::Forward);
        assert_eq!(forward, PositionWithSiteId::new(5, 3_000));

        // Fragment mirrored 6_999 - p against parent mirrored 9_999 - (p + 3_000)
        let reverse = frame.to_parent(PositionWithSiteId::new(1, 6_999), Strand::Reverse);
        assert_eq!(reverse, PositionWithSiteId::new(5, 6_999));

        let head = FragmentFrame {
            site_offset: 0,
            offset: 0,
            fragment_length: 4_001,
            parent_length: 10_000,
        };
        // Fragment label at 4_000 is mirrored to 0; in the parent it is 5_999
        let reverse = head.to_parent(PositionWithSiteId::new(3, 0), Strand::Reverse);
        assert_eq!(reverse, PositionWithSiteId::new(3, 5_999));
    }
}
