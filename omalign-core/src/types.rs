use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::{AlignError, AlignResult};

/// Coordinate along a molecule, in base pairs. Signed because window and
/// shift arithmetic routinely crosses zero.
pub type Position = i64;
pub type MoleculeId = u32;

/// One labelled molecule: an ordered list of label coordinates plus the
/// molecule length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpticalMap {
    molecule_id: MoleculeId,
    length: Position,
    positions: Vec<Position>,
}

impl OpticalMap {
    pub fn new(molecule_id: MoleculeId, length: Position, positions: Vec<Position>) -> AlignResult<Self> {
        if length < 0 {
            return Err(AlignError::invalid_parameter(format!(
                "molecule {} has negative length {}",
                molecule_id, length
            )));
        }
        if let Some(&first) = positions.first() {
            if first < 0 {
                return Err(AlignError::invalid_parameter(format!(
                    "molecule {} has a label at negative position {}",
                    molecule_id, first
                )));
            }
        }
        if let Some(&last) = positions.last() {
            if last > length {
                return Err(AlignError::invalid_parameter(format!(
                    "molecule {} has a label at {} beyond its length {}",
                    molecule_id, last, length
                )));
            }
        }
        if positions.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AlignError::invalid_parameter(format!(
                "molecule {} labels are not strictly increasing",
                molecule_id
            )));
        }

        Ok(Self {
            molecule_id,
            length,
            positions,
        })
    }

    pub fn molecule_id(&self) -> MoleculeId {
        self.molecule_id
    }

    pub fn length(&self) -> Position {
        self.length
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn label_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// End of the default vectorisation window: the molecule length, widened
    /// so that a label sitting exactly on the end is still counted.
    pub fn vector_end(&self) -> Position {
        match self.positions.last() {
            Some(&last) => self.length.max(last + 1),
            None => self.length,
        }
    }

    /// Label coordinate for a 1-based site id, in the map's own frame.
    pub fn site_position(&self, site_id: usize) -> Option<Position> {
        site_id.checked_sub(1).and_then(|i| self.positions.get(i).copied())
    }

    /// Labels with their site ids, walked in the requested orientation.
    ///
    /// On the reverse strand the list runs end-to-start, each site keeps its
    /// original id and its position is mirrored by `length - 1`.
    pub fn sites(&self, strand: Strand) -> Vec<PositionWithSiteId> {
        match strand {
            Strand::Forward => self
                .positions
                .iter()
                .enumerate()
                .map(|(i, &position)| PositionWithSiteId::new(i + 1, position))
                .collect(),
            Strand::Reverse => self
                .positions
                .iter()
                .enumerate()
                .rev()
                .map(|(i, &position)| PositionWithSiteId::new(i + 1, self.mirror(position)))
                .collect(),
        }
    }

    /// Mirror a coordinate into (or out of) the reverse-strand frame.
    pub fn mirror(&self, position: Position) -> Position {
        self.length - 1 - position
    }

    /// Sub-map made of the labels at `range` (0-based indices), with every
    /// position shifted down by `offset`.
    pub fn fragment(&self, range: Range<usize>, offset: Position, length: Position) -> AlignResult<OpticalMap> {
        let positions = self.positions[range]
            .iter()
            .map(|p| p - offset)
            .collect();
        OpticalMap::new(self.molecule_id, length, positions)
    }
}

/// A label addressed by its 1-based site id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionWithSiteId {
    pub site_id: usize,
    pub position: Position,
}

impl PositionWithSiteId {
    pub fn new(site_id: usize, position: Position) -> Self {
        Self { site_id, position }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub const BOTH: [Strand; 2] = [Strand::Forward, Strand::Reverse];

    pub fn is_reverse(self) -> bool {
        matches!(self, Strand::Reverse)
    }

    /// Parse the `+`/`-` orientation symbol used by alignment tables.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "+" => Some(Strand::Forward),
            "-" => Some(Strand::Reverse),
            _ => None,
        }
    }
}

impl From<bool> for Strand {
    fn from(reverse: bool) -> Self {
        if reverse {
            Strand::Reverse
        } else {
            Strand::Forward
        }
    }
}

impl From<Strand> for char {
    fn from(strand: Strand) -> Self {
        match strand {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}
