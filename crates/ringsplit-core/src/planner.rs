//! Split planning: cut the token ring into disjoint work units so a
//! parallel compute layer can read a table in independent chunks.
//!
//! Two modes are supported:
//! - bisect mode: every native range is halved `log2(factor)` times
//! - split-size mode: every native range is cut into as many near-equal
//!   parts as its estimated row count needs to approach a target split size

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PlanError;
use crate::token::{normalize_ring, Partitioner, Token, TokenRange};

/// A unit of parallel work: one token range of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    /// Position of the split in ring order, starting at 0.
    pub index: usize,
    pub range: TokenRange,
    /// Estimated number of rows in the range, when estimates were available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_rows: Option<u64>,
}

/// How to cut each native range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    /// Halve every range until `factor` sub-ranges exist. Must be a power of two.
    Bisect(i64),
    /// Aim every split at `target` rows. The average split may exceed the
    /// target by at most `granularity` rows.
    SplitSize { target: i64, granularity: u64 },
}

impl PlanMode {
    pub const DEFAULT_GRANULARITY: u64 = 1;

    pub fn split_size(target: i64) -> Self {
        PlanMode::SplitSize {
            target,
            granularity: Self::DEFAULT_GRANULARITY,
        }
    }
}

impl Default for PlanMode {
    fn default() -> Self {
        PlanMode::Bisect(1)
    }
}

/// Estimated row counts per native range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeEstimates {
    rows: BTreeMap<TokenRange, u64>,
}

impl SizeEstimates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, range: TokenRange, rows: u64) {
        self.rows.insert(range, rows);
    }

    /// Rows estimated for `range`. Ranges without an estimate count as empty.
    pub fn rows(&self, range: &TokenRange) -> u64 {
        self.rows.get(range).copied().unwrap_or(0)
    }

    /// Build estimates keyed by normalized ranges from `(start, end)` pairs as
    /// the cluster reports them. The rows of a wrapping range are shared
    /// between its two halves in proportion to their width.
    pub fn from_reported(reported: &[((Token, Token), u64)], partitioner: Partitioner) -> Self {
        let mut estimates = Self::new();
        for &(bounds, rows) in reported {
            let pieces = normalize_ring(&[bounds], partitioner);
            let total: u128 = pieces.iter().map(|p| p.width()).sum();
            let mut assigned = 0u64;
            for (i, piece) in pieces.iter().enumerate() {
                let share = if i + 1 == pieces.len() {
                    rows.saturating_sub(assigned)
                } else {
                    proportion(rows, piece.width(), total)
                };
                assigned += share;
                *estimates.rows.entry(*piece).or_insert(0) += share;
            }
        }
        estimates
    }
}

/// `rows * part / total` without overflowing. Random-partitioner widths reach
/// 2^127, so both widths are shifted down until the product fits.
fn proportion(rows: u64, part: u128, total: u128) -> u64 {
    let (mut part, mut total) = (part, total);
    loop {
        match (rows as u128).checked_mul(part) {
            Some(product) => return (product / total.max(1)).min(rows as u128) as u64,
            None => {
                part >>= 1;
                total >>= 1;
            }
        }
    }
}

impl FromIterator<(TokenRange, u64)> for SizeEstimates {
    fn from_iter<I: IntoIterator<Item = (TokenRange, u64)>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Check that `factor` is a positive power of two and return `log2(factor)`.
pub fn validate_bisect_factor(factor: i64) -> Result<u32, PlanError> {
    if factor <= 0 || (factor & (factor - 1)) != 0 {
        return Err(PlanError::InvalidBisectFactor(factor));
    }
    Ok(factor.trailing_zeros())
}

/// Plan the splits for `ring`.
///
/// `ring` must be sorted by start, gap-free and non-overlapping, and contain
/// no zero-width ranges (see [`crate::token::normalize_ring`]). The output
/// covers exactly the same tokens, sorted by start, with indices `0..n`.
/// `estimates` is only consulted in split-size mode.
pub fn plan(
    ring: &[TokenRange],
    mode: PlanMode,
    estimates: &SizeEstimates,
) -> Result<Vec<Split>, PlanError> {
    // Mode arguments are checked before the ring so misuse is reported first.
    let cutter = match mode {
        PlanMode::Bisect(factor) => Cutter::Bisect {
            depth: validate_bisect_factor(factor)?,
        },
        PlanMode::SplitSize {
            target,
            granularity,
        } => {
            if target <= 0 {
                return Err(PlanError::InvalidSplitSize(target));
            }
            Cutter::Size {
                target: target as u64,
                granularity,
            }
        }
    };

    validate_ring(ring)?;

    let mut pieces: Vec<(TokenRange, Option<u64>)> = Vec::with_capacity(ring.len());
    for range in ring {
        match cutter {
            Cutter::Bisect { depth } => {
                bisect(*range, depth, &mut |r: TokenRange| pieces.push((r, None)));
            }
            Cutter::Size {
                target,
                granularity,
            } => {
                let rows = estimates.rows(range);
                let count = choose_split_count(rows, target, granularity, range.width());
                let parts = cut_even(*range, count);
                let rows_per_part = spread(rows, parts.len() as u64);
                pieces.extend(parts.into_iter().zip(rows_per_part.into_iter().map(Some)));
            }
        }
    }

    let splits: Vec<Split> = pieces
        .into_iter()
        .enumerate()
        .map(|(index, (range, estimated_rows))| Split {
            index,
            range,
            estimated_rows,
        })
        .collect();

    debug!(
        "Planned {} splits from {} native ranges ({:?})",
        splits.len(),
        ring.len(),
        mode
    );

    Ok(splits)
}

#[derive(Debug, Clone, Copy)]
enum Cutter {
    Bisect { depth: u32 },
    Size { target: u64, granularity: u64 },
}

fn validate_ring(ring: &[TokenRange]) -> Result<(), PlanError> {
    if ring.is_empty() {
        return Err(PlanError::EmptyRing);
    }

    for range in ring {
        if range.is_empty() {
            return Err(PlanError::InvalidRing(format!("zero-width range {}", range)));
        }
    }

    for pair in ring.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.start < prev.end {
            return Err(PlanError::InvalidRing(format!(
                "range {} overlaps or precedes {}",
                next, prev
            )));
        }
        if next.start > prev.end {
            return Err(PlanError::InvalidRing(format!(
                "gap between {} and {}",
                prev, next
            )));
        }
    }

    Ok(())
}

/// Recursively halve `range` `depth` times, emitting leaves in ring order.
/// A branch too narrow to halve again is emitted as-is.
fn bisect(range: TokenRange, depth: u32, emit: &mut impl FnMut(TokenRange)) {
    let width = range.width();
    if depth == 0 || width < 2 {
        emit(range);
        return;
    }
    let mid = midpoint(range);
    bisect(TokenRange::new(range.start, mid), depth - 1, emit);
    bisect(TokenRange::new(mid, range.end), depth - 1, emit);
}

fn midpoint(range: TokenRange) -> Token {
    // width / 2 < 2^127, so the cast and the addition stay in range.
    range.start + (range.width() / 2) as Token
}

/// Number of parts a range holding `rows` rows should be cut into.
///
/// `k_hi = ceil(rows / target)` is the fewest parts whose average does not
/// exceed the target. `k_hi - 1` is also eligible when its average exceeds the
/// target by no more than `granularity`. The closer average wins; ties go to
/// the smaller count. The result never exceeds the range width.
pub(crate) fn choose_split_count(rows: u64, target: u64, granularity: u64, width: u128) -> u64 {
    let rows = rows as u128;
    let target = target as u128;

    let k_hi = rows.div_ceil(target).max(1);
    let mut count = k_hi;

    if k_hi > 1 {
        let k_lo = k_hi - 1;
        let within_tolerance = rows <= (target + granularity as u128) * k_lo;
        if within_tolerance {
            // |rows/k_lo - target| <= |target - rows/k_hi|, cross-multiplied.
            let over = (rows - target * k_lo) * k_hi;
            let under = (target * k_hi - rows) * k_lo;
            if over <= under {
                count = k_lo;
            }
        }
    }

    count.min(width).max(1) as u64
}

/// Cut `range` into `count` contiguous parts whose widths differ by at most
/// one token. Wider parts come first.
fn cut_even(range: TokenRange, count: u64) -> Vec<TokenRange> {
    let width = range.width();
    let count = (count as u128).clamp(1, width.max(1));
    let base = width / count;
    let remainder = width % count;

    let mut parts = Vec::with_capacity(count as usize);
    let mut start = range.start;
    for i in 0..count {
        let len = if i < remainder { base + 1 } else { base };
        // The range may be wider than Token::MAX, but every end fits.
        let end = start.checked_add_unsigned(len).unwrap_or(range.end);
        parts.push(TokenRange::new(start, end));
        start = end;
    }
    parts
}

/// Spread `total` over `parts` buckets, remainder on the leading buckets.
fn spread(total: u64, parts: u64) -> Vec<u64> {
    let parts = parts.max(1);
    let base = total / parts;
    let remainder = total % parts;
    (0..parts)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}
