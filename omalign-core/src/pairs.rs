//! Label-to-label correspondences around a refined offset.

use std::collections::{BTreeMap, HashSet};

use crate::types::{OpticalMap, Position, PositionWithSiteId, Strand};

/// One reference label matched to one query label.
///
/// `query_shift = query.position - (reference.position - reference_start)`;
/// its absolute value is the pair distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlignedPair {
    pub reference: PositionWithSiteId,
    pub query: PositionWithSiteId,
    pub query_shift: Position,
}

impl AlignedPair {
    pub fn new(reference: PositionWithSiteId, query: PositionWithSiteId, reference_start: Position) -> Self {
        Self {
            reference,
            query,
            query_shift: query.position - (reference.position - reference_start),
        }
    }

    pub fn distance(&self) -> Position {
        self.query_shift.abs()
    }

    /// Query site id in walking order: ascending along the reference for
    /// both orientations.
    pub fn oriented_query_site(&self, strand: Strand) -> i64 {
        match strand {
            Strand::Forward => self.query.site_id as i64,
            Strand::Reverse => -(self.query.site_id as i64),
        }
    }

    fn rank(&self) -> (Position, Position, usize) {
        (self.distance(), self.query_shift, self.reference.site_id)
    }
}

/// A label that found no partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotAlignedPosition {
    Reference(PositionWithSiteId),
    Query {
        site: PositionWithSiteId,
        /// Query position placed on the reference
        absolute_position: Position,
    },
}

impl NotAlignedPosition {
    pub fn reference_coordinate(&self) -> Position {
        match self {
            NotAlignedPosition::Reference(site) => site.position,
            NotAlignedPosition::Query {
                absolute_position, ..
            } => *absolute_position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlignmentPosition {
    Aligned(AlignedPair),
    NotAligned(NotAlignedPosition),
}

impl AlignmentPosition {
    pub fn reference_coordinate(&self) -> Position {
        match self {
            AlignmentPosition::Aligned(pair) => pair.reference.position,
            AlignmentPosition::NotAligned(position) => position.reference_coordinate(),
        }
    }

    pub fn as_pair(&self) -> Option<&AlignedPair> {
        match self {
            AlignmentPosition::Aligned(pair) => Some(pair),
            AlignmentPosition::NotAligned(_) => None,
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            AlignmentPosition::Aligned(_) => 0,
            AlignmentPosition::NotAligned(NotAlignedPosition::Reference(_)) => 1,
            AlignmentPosition::NotAligned(NotAlignedPosition::Query { .. }) => 2,
        }
    }
}

/// Enumerates and deduplicates candidate pairs within `max_distance`.
#[derive(Debug, Clone, Copy)]
pub struct PairAligner {
    max_distance: Position,
}

impl PairAligner {
    pub fn new(max_distance: Position) -> Self {
        Self { max_distance }
    }

    pub fn max_distance(&self) -> Position {
        self.max_distance
    }

    /// Pairs and unpaired labels for the query placed at `reference_start`,
    /// sorted by reference coordinate.
    pub fn align(
        &self,
        reference: &OpticalMap,
        query: &OpticalMap,
        reference_start: Position,
        strand: Strand,
    ) -> Vec<AlignmentPosition> {
        let reference_end = reference_start + query.length();
        let low = reference_start - self.max_distance;
        let high = reference_end + self.max_distance;

        let reference_sites: Vec<PositionWithSiteId> = reference
            .sites(Strand::Forward)
            .into_iter()
            .filter(|site| site.position >= low && site.position <= high)
            .collect();
        let query_sites = query.sites(strand);

        let candidates = self.candidates(&reference_sites, &query_sites, reference_start);
        let pairs = deduplicate(candidates);

        let paired_reference: HashSet<usize> = pairs.iter().map(|p| p.reference.site_id).collect();
        let paired_query: HashSet<usize> = pairs.iter().map(|p| p.query.site_id).collect();

        let mut positions: Vec<AlignmentPosition> = pairs.into_iter().map(AlignmentPosition::Aligned).collect();
        positions.extend(
            reference_sites
                .iter()
                .filter(|site| !paired_reference.contains(&site.site_id))
                .map(|&site| AlignmentPosition::NotAligned(NotAlignedPosition::Reference(site))),
        );
        positions.extend(
            query_sites
                .iter()
                .filter(|site| !paired_query.contains(&site.site_id))
                .map(|&site| {
                    AlignmentPosition::NotAligned(NotAlignedPosition::Query {
                        site,
                        absolute_position: site.position + reference_start,
                    })
                }),
        );

        positions.sort_by_key(|p| (p.reference_coordinate(), p.kind_rank()));
        positions
    }

    fn candidates(
        &self,
        reference_sites: &[PositionWithSiteId],
        query_sites: &[PositionWithSiteId],
        reference_start: Position,
    ) -> Vec<AlignedPair> {
        let mut candidates = Vec::new();

        for reference_site in reference_sites {
            let low = reference_site.position - self.max_distance - reference_start;
            let high = reference_site.position + self.max_distance - reference_start;
            let first = query_sites.partition_point(|q| q.position < low);

            for query_site in query_sites[first..].iter().take_while(|q| q.position <= high) {
                candidates.push(AlignedPair::new(*reference_site, *query_site, reference_start));
            }
        }

        candidates
    }
}

/// Keep one pair per query site, then one per reference site, preferring the
/// smallest distance, then the lower shift, then the lower reference site.
pub fn deduplicate(candidates: Vec<AlignedPair>) -> Vec<AlignedPair> {
    let by_query = best_per_key(candidates, |pair| pair.query.site_id);
    let mut pairs = best_per_key(by_query, |pair| pair.reference.site_id);
    pairs.sort_by_key(|pair| pair.reference.position);
    pairs
}

fn best_per_key(pairs: Vec<AlignedPair>, key: impl Fn(&AlignedPair) -> usize) -> Vec<AlignedPair> {
    let mut best: BTreeMap<usize, AlignedPair> = BTreeMap::new();
    for pair in pairs {
        best.entry(key(&pair))
            .and_modify(|current| {
                if pair.rank() < current.rank() {
                    *current = pair;
                }
            })
            .or_insert(pair);
    }
    best.into_values().collect()
}
