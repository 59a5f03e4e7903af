//! Typed errors for the core crate.

use thiserror::Error;

/// Errors raised by the split planner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("bisect factor must be a positive power of two, got {0}")]
    InvalidBisectFactor(i64),

    #[error("split size must be a positive integer, got {0}")]
    InvalidSplitSize(i64),

    #[error("token ring is empty")]
    EmptyRing,

    #[error("invalid token ring: {0}")]
    InvalidRing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown consistency level '{0}'")]
pub struct UnknownConsistencyLevel(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported partitioner '{0}'")]
pub struct UnknownPartitioner(pub String);
