//! Token ring model.
//!
//! A partitioner hashes every partition key onto a numeric token space. The
//! cluster divides that space into contiguous ranges, each owned by a set of
//! replicas. Ranges here are half-open `[start, end)`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownPartitioner;

/// A position on the token ring. Wide enough for every supported partitioner.
pub type Token = i128;

/// A half-open interval `[start, end)` over the token space.
///
/// Ordering is by `start`, then `end`, which matches ring order for
/// non-overlapping ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenRange {
    pub start: Token,
    pub end: Token,
}

impl TokenRange {
    pub fn new(start: Token, end: Token) -> Self {
        Self { start, end }
    }

    /// Number of tokens in the range. Zero for empty or inverted ranges.
    pub fn width(&self) -> u128 {
        if self.end <= self.start {
            0
        } else {
            self.end.abs_diff(self.start)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0
    }
}

impl fmt::Display for TokenRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

const MURMUR3_CLASS: &str = "org.apache.cassandra.dht.Murmur3Partitioner";
const RANDOM_CLASS: &str = "org.apache.cassandra.dht.RandomPartitioner";

/// The partitioners whose token space ringsplit knows how to bisect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Partitioner {
    /// 64-bit signed tokens, `[-2^63, 2^63)`.
    #[default]
    Murmur3,
    /// MD5 tokens, `[0, 2^127 - 1)`.
    Random,
}

impl Partitioner {
    pub fn class_name(&self) -> &'static str {
        match self {
            Partitioner::Murmur3 => MURMUR3_CLASS,
            Partitioner::Random => RANDOM_CLASS,
        }
    }

    pub fn min_token(&self) -> Token {
        match self {
            Partitioner::Murmur3 => i64::MIN as Token,
            Partitioner::Random => 0,
        }
    }

    /// Exclusive upper bound of the token space.
    pub fn max_token(&self) -> Token {
        match self {
            Partitioner::Murmur3 => i64::MAX as Token + 1,
            Partitioner::Random => Token::MAX,
        }
    }

    /// The whole token space as a single range.
    pub fn full_ring(&self) -> TokenRange {
        TokenRange::new(self.min_token(), self.max_token())
    }
}

impl fmt::Display for Partitioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

impl FromStr for Partitioner {
    type Err = UnknownPartitioner;

    /// Accepts the fully qualified class name or its simple name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let simple = s.trim().rsplit('.').next().unwrap_or_default();
        match simple {
            "Murmur3Partitioner" => Ok(Partitioner::Murmur3),
            "RandomPartitioner" => Ok(Partitioner::Random),
            _ => Err(UnknownPartitioner(s.to_string())),
        }
    }
}

/// Turn the ranges reported by a cluster into a sorted, non-wrapping ring.
///
/// Clusters report ranges as `(start, end)` pairs where the last range wraps
/// past the end of the token space (`start >= end`). Such a range is cut into
/// `[start, max)` and `[min, end)`; a pair with `start == end` owns the whole
/// ring. Empty pieces are dropped and the result is sorted by `start`.
pub fn normalize_ring(reported: &[(Token, Token)], partitioner: Partitioner) -> Vec<TokenRange> {
    let min = partitioner.min_token();
    let max = partitioner.max_token();

    let mut ring = Vec::with_capacity(reported.len() + 1);
    for &(start, end) in reported {
        if start < end {
            ring.push(TokenRange::new(start, end));
        } else {
            ring.push(TokenRange::new(start, max));
            ring.push(TokenRange::new(min, end));
        }
    }

    ring.retain(|range| !range.is_empty());
    ring.sort();
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width() {
        assert_eq!(TokenRange::new(0, 100).width(), 100);
        assert_eq!(TokenRange::new(-10, 10).width(), 20);
        assert_eq!(TokenRange::new(5, 5).width(), 0);
        assert_eq!(TokenRange::new(10, 5).width(), 0);
    }

    #[test]
    fn test_width_full_murmur3_ring() {
        let ring = Partitioner::Murmur3.full_ring();
        assert_eq!(ring.width(), 1u128 << 64);
    }

    #[test]
    fn test_partitioner_from_class_name() {
        assert_eq!(
            "org.apache.cassandra.dht.Murmur3Partitioner".parse::<Partitioner>(),
            Ok(Partitioner::Murmur3)
        );
        assert_eq!("RandomPartitioner".parse::<Partitioner>(), Ok(Partitioner::Random));
        assert!("org.apache.cassandra.dht.ByteOrderedPartitioner"
            .parse::<Partitioner>()
            .is_err());
    }

    #[test]
    fn test_partitioner_default_is_murmur3() {
        assert_eq!(Partitioner::default(), Partitioner::Murmur3);
        assert_eq!(Partitioner::default().to_string(), MURMUR3_CLASS);
    }

    #[test]
    fn test_normalize_sorted_input_unchanged() {
        let ring = normalize_ring(&[(0, 10), (10, 20)], Partitioner::Random);
        assert_eq!(ring, vec![TokenRange::new(0, 10), TokenRange::new(10, 20)]);
    }

    #[test]
    fn test_normalize_unwraps_last_range() {
        let p = Partitioner::Murmur3;
        let ring = normalize_ring(&[(-100, 100), (100, -100)], p);
        assert_eq!(
            ring,
            vec![
                TokenRange::new(p.min_token(), -100),
                TokenRange::new(-100, 100),
                TokenRange::new(100, p.max_token()),
            ]
        );
    }

    #[test]
    fn test_normalize_single_node_owns_everything() {
        let p = Partitioner::Murmur3;
        let ring = normalize_ring(&[(0, 0)], p);
        assert_eq!(
            ring,
            vec![TokenRange::new(p.min_token(), 0), TokenRange::new(0, p.max_token())]
        );
    }

    #[test]
    fn test_normalize_drops_empty_pieces() {
        let p = Partitioner::Random;
        // Wraps exactly at the minimum token: the [min, min) half is empty.
        let ring = normalize_ring(&[(0, 50), (50, 0)], p);
        assert_eq!(
            ring,
            vec![TokenRange::new(0, 50), TokenRange::new(50, p.max_token())]
        );
    }
}
