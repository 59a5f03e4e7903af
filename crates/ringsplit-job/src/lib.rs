//! Ringsplit Job - configuring a read or write job against a cluster
//!
//! A [`JobConfig`] accumulates identity, connection, consistency, batching,
//! filter and split settings through fluent setters. [`JobConfig::initialize`]
//! resolves table metadata, validates the filters against it and plans the
//! read splits, then freezes the configuration into a shareable
//! [`FinalizedJob`].

pub mod config;
pub mod error;
pub mod job;
pub mod validation;

pub use error::JobError;
pub use job::{FinalizedJob, JobConfig, ReadTask};
pub use validation::{validate_filters, ValidationError};
