//! Ringsplit Core - token ring model and split planning
//!
//! This crate holds the datastore-independent pieces of ringsplit:
//! - the token ring model (tokens, ranges, partitioners)
//! - table schema metadata
//! - consistency levels
//! - the split planner that turns a ring into parallel work units

pub mod consistency;
pub mod error;
pub mod planner;
pub mod schema;
pub mod token;

pub use consistency::ConsistencyLevel;
pub use error::{PlanError, UnknownConsistencyLevel, UnknownPartitioner};
pub use planner::{plan, validate_bisect_factor, PlanMode, SizeEstimates, Split};
pub use schema::{ColumnDefinition, IndexKind, TableMetadata};
pub use token::{normalize_ring, Partitioner, Token, TokenRange};
