//! HitEnum strings: CIGAR-like run-length summaries of a label alignment.

use std::fmt::Write;

use crate::error::{AlignError, AlignResult};
use crate::pairs::AlignedPair;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum HitOp {
    M = b'M', // Paired labels
    I = b'I', // Query label with no reference partner
    D = b'D', // Reference label with no query partner
}

impl HitOp {
    #[inline(always)]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'M' => Some(Self::M),
            b'I' => Some(Self::I),
            b'D' => Some(Self::D),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Expand aligned pairs into one operation per label.
///
/// Pairs are walked in reference-site order; a run of pairs sharing one
/// query site keeps only its last pair.
pub fn hit_ops(pairs: &[AlignedPair]) -> Vec<HitOp> {
    let mut sorted: Vec<&AlignedPair> = pairs.iter().collect();
    sorted.sort_by_key(|p| p.reference.site_id);

    let mut walk: Vec<&AlignedPair> = Vec::with_capacity(sorted.len());
    for pair in sorted {
        match walk.last_mut() {
            Some(last) if last.query.site_id == pair.query.site_id => *last = pair,
            _ => walk.push(pair),
        }
    }

    let mut ops = Vec::with_capacity(walk.len() * 2);
    let mut previous: Option<&AlignedPair> = None;
    for pair in walk {
        if let Some(prev) = previous {
            let query_step = pair.query.site_id.abs_diff(prev.query.site_id);
            let reference_step = pair.reference.site_id - prev.reference.site_id;
            ops.extend(std::iter::repeat(HitOp::I).take(query_step.saturating_sub(1)));
            ops.extend(std::iter::repeat(HitOp::D).take(reference_step.saturating_sub(1)));
        }
        ops.push(HitOp::M);
        previous = Some(pair);
    }
    ops
}

/// Run-length encode operations, e.g. `MMIM` → `2M1I1M`.
pub fn encode(ops: &[HitOp]) -> String {
    let mut out = String::new();
    let mut iter = ops.iter().peekable();
    while let Some(&op) = iter.next() {
        let mut count = 1;
        while iter.peek() == Some(&&op) {
            iter.next();
            count += 1;
        }
        let _ = write!(out, "{}{}", count, op.to_byte() as char);
    }
    out
}

/// Expand a run-length HitEnum. `line` locates the string in its input file.
pub fn decode(hit_enum: &str, line: usize) -> AlignResult<Vec<HitOp>> {
    let mut ops = Vec::new();
    let mut count: Option<usize> = None;

    for b in hit_enum.bytes() {
        if b.is_ascii_digit() {
            count = count
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|c| c.checked_add(usize::from(b - b'0')));
            if count.is_none() {
                return Err(AlignError::malformed(line, format!("HitEnum count overflow in {}", hit_enum)));
            }
            continue;
        }
        let op = HitOp::from_byte(b).ok_or_else(|| {
            AlignError::malformed(line, format!("invalid HitEnum operation '{}' in {}", b as char, hit_enum))
        })?;
        let n = count
            .take()
            .ok_or_else(|| AlignError::malformed(line, format!("HitEnum operation without count in {}", hit_enum)))?;
        ops.extend(std::iter::repeat(op).take(n));
    }

    if count.is_some() {
        return Err(AlignError::malformed(line, format!("trailing count in HitEnum {}", hit_enum)));
    }
    Ok(ops)
}

/// HitEnum string for a set of aligned pairs.
pub fn hit_enum(pairs: &[AlignedPair]) -> String {
    encode(&hit_ops(pairs))
}
